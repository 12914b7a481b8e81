//! Migration driver - list, transform, reconcile, one entity at a time

use futures::StreamExt;

use super::reconcile::{Reconciled, Reconciler, Resolution};
use super::transform::Transformer;
use super::{EntityType, NameRef, PortableEntity, RawEntity};
use crate::api::StoreClient;
use crate::config::SecretSource;
use crate::error::PortError;

/// Selection window applied over the paginated source listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub limit: Option<usize>,
    /// Raw server-side filter appended to the listing URL
    pub query: Option<String>,
    pub start_from: usize,
    /// Name of one entity to skip
    pub exclude: Option<String>,
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub link_failures: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Reconciled) {
        match outcome.resolution {
            Resolution::Created(_) => self.created += 1,
            Resolution::Existing(_) => self.existing += 1,
            Resolution::DryRun => self.skipped += 1,
            Resolution::Rejected(_) => self.failed += 1,
        }
        self.link_failures += outcome.link_failures.len();
    }
}

/// Drives one entity type through the pipeline
pub struct Driver<'a> {
    source: &'a StoreClient,
    organization: &'a str,
}

impl<'a> Driver<'a> {
    pub fn new(source: &'a StoreClient, organization: &'a str) -> Self {
        Self {
            source,
            organization,
        }
    }

    /// Migrate every selected entity of `kind` to `destination`
    ///
    /// Per-entity failures are logged and counted; the run goes on. Only
    /// problems found before any entity is touched, or a listing page that
    /// cannot be fetched, end the run with an error.
    pub async fn migrate(
        &self,
        kind: EntityType,
        options: &RunOptions,
        destination: &StoreClient,
        secrets: Option<&SecretSource>,
    ) -> Result<RunSummary, PortError> {
        if kind == EntityType::WorkflowNode {
            return Err(PortError::Config(
                "workflow nodes are migrated with their workflow_job_template".into(),
            ));
        }
        let secrets = match kind {
            EntityType::Credential => Some(secrets.ok_or_else(|| {
                PortError::Config("Migrating credentials needs a secrets file".into())
            })?),
            _ => None,
        };

        let transformer = Transformer::new(self.source, self.organization);
        let reconciler = Reconciler::new(destination);
        let mut summary = RunSummary::default();

        let entities = self.selection(kind, options);
        let mut entities = std::pin::pin!(entities);
        while let Some(raw) = entities.next().await {
            let raw = raw?;
            if is_excluded(&raw, options) {
                summary.skipped += 1;
                continue;
            }
            summary.processed += 1;

            let name = raw.display_name();
            log::info!("Migrating {} '{}'", kind, name);
            let result = async {
                let mut entity = transformer.transform(kind, &raw).await?;
                if let Some(secrets) = secrets {
                    self.add_secrets(&mut entity, secrets)?;
                }
                reconciler.reconcile(&entity).await
            }
            .await;

            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(e) if e.is_fatal() => {
                    log::error!("Skipping {} '{}': {} (fix the settings and re-run)", kind, name, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    log::error!("Skipping {} '{}': {}", kind, name, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Transform every selected entity of `kind`, keeping source order
    ///
    /// Entities that fail to transform are logged and left out.
    pub async fn export(
        &self,
        kind: EntityType,
        options: &RunOptions,
    ) -> Result<(Vec<PortableEntity>, RunSummary), PortError> {
        let transformer = Transformer::new(self.source, self.organization);
        let mut summary = RunSummary::default();
        let mut exported = Vec::new();

        let entities = self.selection(kind, options);
        let mut entities = std::pin::pin!(entities);
        while let Some(raw) = entities.next().await {
            let raw = raw?;
            if is_excluded(&raw, options) {
                summary.skipped += 1;
                continue;
            }
            summary.processed += 1;

            match transformer.transform(kind, &raw).await {
                Ok(entity) => exported.push(entity),
                Err(e) => {
                    log::error!("Leaving {} '{}' out of the export: {}", kind, raw.display_name(), e);
                    summary.failed += 1;
                }
            }
        }

        Ok((exported, summary))
    }

    /// The listing with `start_from` and `limit` applied
    fn selection(
        &self,
        kind: EntityType,
        options: &RunOptions,
    ) -> impl futures::Stream<Item = Result<RawEntity, PortError>> + '_ {
        self.source
            .list(kind, options.query.as_deref())
            .skip(options.start_from)
            .take(options.limit.unwrap_or(usize::MAX))
    }

    /// Merge secret inputs and the organization into a credential
    fn add_secrets(&self, entity: &mut PortableEntity, secrets: &SecretSource) -> Result<(), PortError> {
        let name = entity.display_name();
        let inputs = secrets.inputs_for(&name).ok_or_else(|| {
            PortError::Config(format!("No entry for credential '{}' in the secrets file", name))
        })?;

        entity.fields.insert("inputs".to_string(), inputs.clone());
        entity.references.insert(
            "organization".to_string(),
            NameRef::new(EntityType::Organization, self.organization),
        );
        Ok(())
    }
}

fn is_excluded(raw: &RawEntity, options: &RunOptions) -> bool {
    let excluded = options
        .exclude
        .as_deref()
        .is_some_and(|exclude| raw.name() == Some(exclude));
    if excluded {
        log::info!("Excluding '{}'", raw.display_name());
    }
    excluded
}
