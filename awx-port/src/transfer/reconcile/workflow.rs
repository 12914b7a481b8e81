//! Workflow node reconciliation
//!
//! Nodes only exist inside their workflow, so they are matched by
//! (`workflow_job_template`, `identifier`). Every node is placed before any
//! sibling edge is linked, since an edge needs both destination ids.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::Reconciler;
use crate::api::CreateOutcome;
use crate::error::PortError;
use crate::transfer::{
    check_node_references, EntityType, NameRef, PortableEntity, RawEntity, WorkflowNode,
};

impl Reconciler<'_> {
    pub(super) async fn reconcile_nodes(
        &self,
        workflow: &PortableEntity,
        parent: &RawEntity,
        nodes: &[WorkflowNode],
        failures: &mut Vec<PortError>,
    ) {
        if let Err(dangling) = check_node_references(nodes) {
            failures.push(PortError::data(
                workflow.kind,
                workflow.display_name(),
                dangling.to_string(),
            ));
            return;
        }
        let Some(workflow_id) = parent.id() else {
            failures.push(node_failure(workflow, "*", "destination workflow has no id"));
            return;
        };

        let mut placed: HashMap<&str, (RawEntity, bool)> = HashMap::new();
        for node in nodes {
            match self.place_node(workflow, workflow_id, node).await {
                Ok(Some(destination)) => {
                    placed.insert(node.identifier.as_str(), destination);
                }
                Ok(None) => {}
                Err(e) => failures.push(e),
            }
        }

        for node in nodes {
            let Some((source, existed)) = placed.get(node.identifier.as_str()) else {
                continue;
            };
            for (edge, target) in node.edges() {
                // a sibling that failed to place was already reported
                let Some(target_id) = placed.get(target).and_then(|(t, _)| t.id()) else {
                    continue;
                };
                let Some(locator) = source.related_url(edge.key()) else {
                    failures.push(node_failure(
                        workflow,
                        &node.identifier,
                        format!("destination node has no related.{} endpoint", edge.key()),
                    ));
                    continue;
                };
                if *existed {
                    match self.linked_ids(locator).await {
                        Ok(linked) if linked.contains(&target_id) => continue,
                        Ok(_) => {}
                        Err(e) => {
                            failures.push(node_failure(workflow, &node.identifier, e));
                            continue;
                        }
                    }
                }
                if let Err(e) = self.destination.link(locator, target_id).await {
                    failures.push(node_failure(
                        workflow,
                        &node.identifier,
                        format!("linking {} to '{}' failed: {}", edge.key(), target, e),
                    ));
                }
            }
        }
    }

    /// Find or create one node, flagging nodes that already existed;
    /// `None` means the create was a dry run
    async fn place_node(
        &self,
        workflow: &PortableEntity,
        workflow_id: i64,
        node: &WorkflowNode,
    ) -> Result<Option<(RawEntity, bool)>, PortError> {
        let kind = EntityType::WorkflowNode;
        let mut filters = Map::new();
        filters.insert("workflow_job_template".to_string(), json!(workflow_id));
        filters.insert("identifier".to_string(), json!(node.identifier));

        if let Some(existing) = self.destination.search(kind, &filters).await?.into_iter().next() {
            log::info!(
                "Node '{}' of {} '{}' already exists",
                node.identifier,
                workflow.kind,
                workflow.display_name()
            );
            return Ok(Some((existing, true)));
        }

        let mut payload = filters;
        for (field, value) in &node.fields {
            payload.insert(field.clone(), value.clone());
        }

        let template = &node.unified_job_template;
        if let Some(template_kind) = template.kind.entity_type() {
            let reference = NameRef::new(template_kind, &template.name);
            let id = self.resolve(workflow, &reference, &[]).await?;
            payload.insert("unified_job_template".to_string(), Value::from(id.id));
        }
        if let Some(inventory) = &template.inventory {
            let reference = NameRef::new(EntityType::Inventory, &inventory.name);
            let id = self.resolve(workflow, &reference, &[]).await?;
            payload.insert("inventory".to_string(), Value::from(id.id));
        }

        let created = match self.destination.create(kind, &payload).await? {
            CreateOutcome::Created(created) => created,
            CreateOutcome::DryRun => return Ok(None),
            CreateOutcome::Rejected(response) => {
                return Err(node_failure(
                    workflow,
                    &node.identifier,
                    format!("create rejected with HTTP {}: {}", response.status, response.summary()),
                ));
            }
        };

        // approval nodes carry their own template, created through the node
        if template.kind.entity_type().is_none() {
            let locator = created.related_url("create_approval_template").ok_or_else(|| {
                node_failure(workflow, &node.identifier, "no create_approval_template endpoint")
            })?;
            let approval = json!({
                "name": template.name,
                "description": template.description,
            });
            self.destination.attach(locator, &approval).await?;
        }

        Ok(Some((created, false)))
    }
}

fn node_failure(workflow: &PortableEntity, identifier: &str, message: impl std::fmt::Display) -> PortError {
    PortError::reconciliation(
        workflow.kind,
        workflow.display_name(),
        format!("node '{}': {}", identifier, message),
    )
}
