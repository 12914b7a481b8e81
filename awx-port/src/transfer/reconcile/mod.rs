//! Reconciliation against the destination store
//!
//! Resolves a portable entity's name references to destination ids, finds
//! or creates the entity, then links its relations. Creation is gated by an
//! equality search so a re-run never duplicates what already exists.

mod workflow;

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::api::{CreateOutcome, HttpResponse, StoreClient};
use crate::error::PortError;
use crate::transfer::catalog::{self, Relation};
use crate::transfer::transform::encode_variables;
use crate::transfer::{EntityType, IdRef, NameRef, PortableEntity, RawEntity, Related};

/// How the destination entity was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// An equal entity already existed; the first match was taken
    Existing(RawEntity),
    Created(RawEntity),
    /// Dry-run mode: the create was logged, not sent
    DryRun,
    /// The store refused the create; its response is kept for reporting
    Rejected(HttpResponse),
}

impl Resolution {
    /// The destination entity, when one exists
    pub fn entity(&self) -> Option<&RawEntity> {
        match self {
            Resolution::Existing(entity) | Resolution::Created(entity) => Some(entity),
            Resolution::DryRun | Resolution::Rejected(_) => None,
        }
    }
}

/// Outcome of reconciling one portable entity
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub kind: EntityType,
    pub name: String,
    pub resolution: Resolution,
    /// Relations that could not be linked; the entity itself stands
    pub link_failures: Vec<PortError>,
}

impl Reconciled {
    pub fn destination_id(&self) -> Option<i64> {
        self.resolution.entity().and_then(RawEntity::id)
    }
}

/// Search-then-create against one destination store
pub struct Reconciler<'a> {
    destination: &'a StoreClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(destination: &'a StoreClient) -> Self {
        Self { destination }
    }

    /// Find or create `entity` on the destination, then link its relations
    ///
    /// Unresolvable references and transport failures during the lookup or
    /// create are errors for this entity. Link failures are collected in the
    /// outcome instead, after every relation has been attempted.
    pub async fn reconcile(&self, entity: &PortableEntity) -> Result<Reconciled, PortError> {
        let kind = entity.kind;
        let name = entity.display_name();
        let payload = self.payload(entity).await?;

        let resolution = match self.destination.search(kind, &payload).await?.into_iter().next() {
            Some(existing) => {
                log::info!(
                    "{} '{}' already exists on destination as #{}",
                    kind,
                    name,
                    existing.id().unwrap_or_default()
                );
                Resolution::Existing(existing)
            }
            None => match self.destination.create(kind, &payload).await? {
                CreateOutcome::Created(created) => Resolution::Created(created),
                CreateOutcome::DryRun => Resolution::DryRun,
                CreateOutcome::Rejected(response) => Resolution::Rejected(response),
            },
        };

        let mut link_failures = Vec::new();
        if resolution.entity().is_some() {
            for (relation, related) in &entity.related {
                self.link_relation(entity, &payload, &resolution, *relation, related, &mut link_failures)
                    .await;
            }
        }

        for failure in &link_failures {
            log::error!("{}", failure);
        }

        Ok(Reconciled {
            kind,
            name,
            resolution,
            link_failures,
        })
    }

    /// Destination payload: kept fields with variables in their source text
    /// (re-encoded when there is none), name references replaced by
    /// destination ids, relations left out
    async fn payload(&self, entity: &PortableEntity) -> Result<Map<String, Value>, PortError> {
        let rule = catalog::rule(entity.kind);
        let mut payload = Map::new();

        for (field, value) in &entity.fields {
            let value = if let Some(text) = entity.source_text.get(field) {
                Value::String(text.clone())
            } else if rule.is_decoded(field) {
                encode_variables(value)
            } else {
                value.clone()
            };
            payload.insert(field.clone(), value);
        }

        for (field, reference) in &entity.references {
            let id = self.resolve(entity, reference, &[]).await?;
            payload.insert(field.clone(), Value::from(id.id));
        }

        Ok(payload)
    }

    /// Look up a referenced entity on the destination by name
    async fn resolve(
        &self,
        owner: &PortableEntity,
        reference: &NameRef,
        scope: &[(&str, Value)],
    ) -> Result<IdRef, PortError> {
        let found = self
            .destination
            .find_by_name(reference.kind, &reference.name, scope)
            .await?;

        found
            .and_then(|e| e.id())
            .map(|id| IdRef {
                kind: reference.kind,
                id,
            })
            .ok_or_else(|| {
                PortError::reconciliation(
                    owner.kind,
                    owner.display_name(),
                    format!("{} '{}' not found on destination", reference.kind, reference.name),
                )
            })
    }

    /// Ids already associated through a relation endpoint
    async fn linked_ids(&self, locator: &str) -> Result<HashSet<i64>, PortError> {
        Ok(self
            .destination
            .get_results(locator)
            .await?
            .iter()
            .filter_map(RawEntity::id)
            .collect())
    }

    async fn link_relation(
        &self,
        entity: &PortableEntity,
        payload: &Map<String, Value>,
        resolution: &Resolution,
        relation: Relation,
        related: &Related,
        failures: &mut Vec<PortError>,
    ) {
        let Some(parent) = resolution.entity() else {
            return;
        };
        let Some(locator) = parent.related_url(relation.key()) else {
            failures.push(PortError::reconciliation(
                entity.kind,
                entity.display_name(),
                format!("destination has no related.{} endpoint", relation.key()),
            ));
            return;
        };

        match related {
            Related::Names(names) if relation.is_link_after_create() => {
                let scope = match (relation.is_inventory_scoped(), payload.get("inventory")) {
                    (true, Some(inventory)) => vec![("inventory", inventory.clone())],
                    _ => Vec::new(),
                };
                // the store refuses to link a child twice
                let linked = if matches!(resolution, Resolution::Existing(_)) {
                    match self.linked_ids(locator).await {
                        Ok(ids) => ids,
                        Err(e) => {
                            failures.push(link_failure(entity, relation, "existing links", e));
                            return;
                        }
                    }
                } else {
                    HashSet::new()
                };
                for name in names {
                    let result = match self.resolve(entity, name, &scope).await {
                        Ok(child) if linked.contains(&child.id) => {
                            log::debug!("{} '{}' already linked to {}", relation.key(), name.name, locator);
                            continue;
                        }
                        Ok(child) => self.destination.link(locator, child.id).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        failures.push(link_failure(entity, relation, &name.name, e));
                    }
                }
            }
            Related::Survey(spec) => {
                if spec.as_object().is_some_and(|s| !s.is_empty()) {
                    if let Err(e) = self.destination.attach(locator, spec).await {
                        failures.push(link_failure(entity, relation, "survey", e));
                    }
                }
            }
            Related::Nodes(nodes) => {
                self.reconcile_nodes(entity, parent, nodes, failures).await;
            }
            Related::Names(_) => {}
        }
    }
}

/// Wrap a failed relation step with the owning entity's context
fn link_failure(entity: &PortableEntity, relation: Relation, target: &str, error: PortError) -> PortError {
    PortError::reconciliation(
        entity.kind,
        entity.display_name(),
        format!("linking {} '{}' failed: {}", relation.key(), target, error),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeStore;
    use crate::api::RunCache;
    use serde_json::json;
    use std::sync::Arc;

    fn host(groups: &[&str]) -> PortableEntity {
        let mut entity = PortableEntity::new(EntityType::Host);
        entity.fields.insert("name".into(), json!("web1"));
        entity.fields.insert("enabled".into(), json!(true));
        entity.fields.insert("variables".into(), json!({"port": 8080}));
        entity
            .references
            .insert("inventory".into(), NameRef::new(EntityType::Inventory, "Prod"));
        entity.related.insert(
            Relation::Groups,
            Related::Names(groups.iter().map(|g| NameRef::new(EntityType::Group, *g)).collect()),
        );
        entity
    }

    fn destination() -> (Arc<FakeStore>, i64) {
        let store = FakeStore::new("https://dest.example");
        let inventory = store.seed(EntityType::Inventory, json!({"name": "Prod"}));
        let inventory_id = inventory["id"].as_i64().unwrap();
        store.seed(EntityType::Group, json!({"name": "web", "inventory": inventory_id}));
        // same name in another inventory must not be picked
        store.seed(EntityType::Group, json!({"name": "db", "inventory": 999}));
        (store, inventory_id)
    }

    #[tokio::test]
    async fn test_reconcile_twice_creates_once() {
        let (store, inventory_id) = destination();
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);
        let entity = host(&["web"]);

        let first = reconciler.reconcile(&entity).await.unwrap();
        let second = reconciler.reconcile(&entity).await.unwrap();

        assert!(matches!(first.resolution, Resolution::Created(_)));
        assert!(matches!(second.resolution, Resolution::Existing(_)));
        assert_eq!(first.destination_id(), second.destination_id());
        assert_eq!(store.entities(EntityType::Host).len(), 1);

        let created = &store.entities(EntityType::Host)[0];
        assert_eq!(created["inventory"], json!(inventory_id));
        assert_eq!(created["variables"], json!("{\"port\":8080}"));
        assert!(created.get("groups").is_none());
        assert!(first.link_failures.is_empty());
        assert!(second.link_failures.is_empty(), "{:?}", second.link_failures);
    }

    #[tokio::test]
    async fn test_links_relations_after_create() {
        let (store, _) = destination();
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        let outcome = reconciler.reconcile(&host(&["web"])).await.unwrap();
        let host_id = outcome.destination_id().unwrap();
        let group_id = store.entities(EntityType::Group)[0]["id"].clone();

        let links = store.posts_to(&format!("/api/v2/hosts/{}/groups/", host_id));
        assert_eq!(links, vec![json!({"id": group_id})]);
    }

    #[tokio::test]
    async fn test_link_failure_does_not_stop_remaining_links() {
        let (store, _) = destination();
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        // 'db' lives in another inventory, 'web' is linkable
        let outcome = reconciler.reconcile(&host(&["db", "web"])).await.unwrap();

        assert!(matches!(outcome.resolution, Resolution::Created(_)));
        assert_eq!(outcome.link_failures.len(), 1);
        assert!(outcome.link_failures[0].to_string().contains("'db'"));
        let host_id = outcome.destination_id().unwrap();
        assert_eq!(store.posts_to(&format!("/api/v2/hosts/{}/groups/", host_id)).len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_skips_links_already_present() {
        let store = FakeStore::new("https://dest.example");
        store.seed(EntityType::Organization, json!({"name": "Default"}));
        let ssh = store.seed(EntityType::Credential, json!({"name": "ssh"}));
        store.seed(EntityType::Credential, json!({"name": "vault"}));
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        let mut template = PortableEntity::new(EntityType::JobTemplate);
        template.fields.insert("name".into(), json!("deploy"));
        template.references.insert(
            "organization".into(),
            NameRef::new(EntityType::Organization, "Default"),
        );
        template.related.insert(
            Relation::Credentials,
            Related::Names(vec![NameRef::new(EntityType::Credential, "ssh")]),
        );

        let first = reconciler.reconcile(&template).await.unwrap();
        // a credential added on the source since the first run
        template.related.insert(
            Relation::Credentials,
            Related::Names(vec![
                NameRef::new(EntityType::Credential, "ssh"),
                NameRef::new(EntityType::Credential, "vault"),
            ]),
        );
        let second = reconciler.reconcile(&template).await.unwrap();

        assert!(matches!(second.resolution, Resolution::Existing(_)));
        assert!(second.link_failures.is_empty(), "{:?}", second.link_failures);
        let id = first.destination_id().unwrap();
        let links = store.posts_to(&format!("/api/v2/job_templates/{}/credentials/", id));
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], json!({"id": ssh["id"]}));
    }

    #[tokio::test]
    async fn test_duplicate_link_is_a_link_failure() {
        let (store, _) = destination();
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        // the same group listed twice within one new entity
        let outcome = reconciler.reconcile(&host(&["web", "web"])).await.unwrap();

        assert!(matches!(outcome.resolution, Resolution::Created(_)));
        assert_eq!(outcome.link_failures.len(), 1);
        assert!(outcome.link_failures[0].to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_missing_reference_is_reconciliation_error() {
        let store = FakeStore::new("https://dest.example");
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        let err = reconciler.reconcile(&host(&[])).await.unwrap_err();

        assert!(matches!(err, PortError::Reconciliation { kind: EntityType::Host, .. }));
        assert!(err.to_string().contains("inventory 'Prod'"));
        assert!(store.posts().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_reported_not_raised() {
        let (store, _) = destination();
        store.fail_post("/api/v2/hosts/", 400);
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        let outcome = reconciler.reconcile(&host(&["web"])).await.unwrap();

        match &outcome.resolution {
            Resolution::Rejected(response) => assert_eq!(response.status, 400),
            other => panic!("unexpected resolution {:?}", other),
        }
        assert_eq!(outcome.destination_id(), None);
        // no links without a destination id
        assert_eq!(store.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_variables_sent_as_source_text() {
        let (store, _) = destination();
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);
        let mut entity = host(&[]);
        entity.fields.insert("variables".into(), json!({"gather": false}));
        entity
            .source_text
            .insert("variables".into(), "# facts\ngather: no\n".into());

        reconciler.reconcile(&entity).await.unwrap();

        let created = &store.entities(EntityType::Host)[0];
        assert_eq!(created["variables"], json!("# facts\ngather: no\n"));
    }

    #[tokio::test]
    async fn test_dry_run_sends_no_writes() {
        let (store, _) = destination();
        let client = store.client(Arc::new(RunCache::new())).with_dry_run(true);
        let reconciler = Reconciler::new(&client);

        let outcome = reconciler.reconcile(&host(&["web"])).await.unwrap();

        assert_eq!(outcome.resolution, Resolution::DryRun);
        assert!(store.posts().is_empty());
    }

    #[tokio::test]
    async fn test_survey_attached_when_present() {
        let store = FakeStore::new("https://dest.example");
        store.seed(EntityType::Organization, json!({"name": "Default"}));
        let client = store.client(Arc::new(RunCache::new()));
        let reconciler = Reconciler::new(&client);

        let mut template = PortableEntity::new(EntityType::JobTemplate);
        template.fields.insert("name".into(), json!("deploy"));
        template.references.insert(
            "organization".into(),
            NameRef::new(EntityType::Organization, "Default"),
        );
        let spec = json!({"name": "", "description": "", "spec": [{"variable": "v"}]});
        template.related.insert(Relation::SurveySpec, Related::Survey(spec.clone()));
        template
            .related
            .insert(Relation::Credentials, Related::Names(Vec::new()));

        let outcome = reconciler.reconcile(&template).await.unwrap();
        let id = outcome.destination_id().unwrap();

        assert_eq!(store.posts_to(&format!("/api/v2/job_templates/{}/survey_spec/", id)), vec![spec]);
        let created = &store.entities(EntityType::JobTemplate)[0];
        assert!(created.get("survey_spec").is_none());
        assert!(created.get("credentials").is_none());
    }
}
