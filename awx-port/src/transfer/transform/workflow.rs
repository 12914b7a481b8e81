//! Workflow node transformation
//!
//! Nodes drop their numeric ids entirely: the launched template is described
//! by name and type, and sibling edges by workflow-scoped identifier.

use std::collections::BTreeMap;

use serde_json::Value;

use super::engine::Transformer;
use crate::error::PortError;
use crate::transfer::catalog;
use crate::transfer::{
    EdgeKind, EntityType, JobKind, Named, NodeRef, RawEntity, UnifiedJobDescriptor, WorkflowNode,
};

impl Transformer<'_> {
    pub(super) async fn transform_node(&self, raw: &RawEntity) -> Result<WorkflowNode, PortError> {
        let kind = EntityType::WorkflowNode;
        let identifier = raw
            .get("identifier")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PortError::data(kind, raw.display_name(), "node has no identifier"))?
            .to_string();

        let fields: BTreeMap<String, Value> = catalog::rule(kind)
            .keep_fields
            .iter()
            .filter(|f| **f != "identifier")
            .filter_map(|f| raw.get(f).map(|v| (f.to_string(), v.clone())))
            .collect();

        let unified_job_template = self.describe_template(raw, &identifier)?;

        let mut related = BTreeMap::new();
        for edge in EdgeKind::all_variants() {
            if !raw.is_set(edge.key()) {
                continue;
            }
            let url = raw.related_url(edge.key()).ok_or_else(|| {
                PortError::data(
                    kind,
                    &identifier,
                    format!("{} is set but related.{} is missing", edge.key(), edge.key()),
                )
            })?;
            let siblings = self
                .source
                .get_results(url)
                .await?
                .iter()
                .map(|sibling| {
                    sibling
                        .get("identifier")
                        .and_then(Value::as_str)
                        .map(|s| NodeRef {
                            identifier: s.to_string(),
                        })
                        .ok_or_else(|| {
                            PortError::data(
                                kind,
                                &identifier,
                                format!("{} sibling {} has no identifier", edge.key(), sibling.display_name()),
                            )
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !siblings.is_empty() {
                related.insert(*edge, siblings);
            }
        }

        Ok(WorkflowNode {
            identifier,
            fields,
            organization: self.organization.to_string(),
            unified_job_template,
            related,
        })
    }

    fn describe_template(
        &self,
        raw: &RawEntity,
        identifier: &str,
    ) -> Result<UnifiedJobDescriptor, PortError> {
        let kind = EntityType::WorkflowNode;
        let summary = raw.summary("unified_job_template").ok_or_else(|| {
            PortError::data(kind, identifier, "node has no unified_job_template summary")
        })?;

        let text = |field: &str| summary.get(field).and_then(Value::as_str).unwrap_or_default();

        let name = text("name");
        if name.is_empty() {
            return Err(PortError::data(kind, identifier, "launched template has no name"));
        }
        let job_type = text("unified_job_type");
        let job_kind = JobKind::from_unified_job_type(job_type).ok_or_else(|| {
            PortError::data(
                kind,
                identifier,
                format!("unsupported unified_job_type '{}'", job_type),
            )
        })?;

        let inventory = if raw.is_set("inventory") {
            let name = raw.summary_name("inventory").ok_or_else(|| {
                PortError::data(kind, identifier, "inventory is set but has no summary")
            })?;
            Some(Named::new(name))
        } else {
            None
        };

        Ok(UnifiedJobDescriptor {
            name: name.to_string(),
            description: text("description").to_string(),
            kind: job_kind,
            organization: Named::new(self.organization),
            inventory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeStore;
    use crate::api::RunCache;
    use serde_json::json;
    use std::sync::Arc;

    fn raw(value: Value) -> RawEntity {
        RawEntity::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_approval_node_with_inventory() {
        let store = FakeStore::new("https://source.example");
        let client = store.client(Arc::new(RunCache::new()));
        let transformer = Transformer::new(&client, "Default");

        let node = raw(json!({
            "id": 4,
            "identifier": "gate",
            "all_parents_must_converge": true,
            "inventory": 7,
            "success_nodes": [],
            "summary_fields": {
                "inventory": {"name": "Prod"},
                "unified_job_template": {
                    "name": "Approve release",
                    "unified_job_type": "workflow_approval"
                }
            }
        }));

        let node = transformer.transform_node(&node).await.unwrap();

        assert_eq!(node.identifier, "gate");
        assert_eq!(node.fields.get("all_parents_must_converge"), Some(&json!(true)));
        assert_eq!(node.unified_job_template.kind, JobKind::WorkflowApproval);
        assert_eq!(node.unified_job_template.description, "");
        assert_eq!(node.unified_job_template.inventory, Some(Named::new("Prod")));
        assert!(node.related.is_empty());
    }

    #[tokio::test]
    async fn test_node_without_identifier_is_rejected() {
        let store = FakeStore::new("https://source.example");
        let client = store.client(Arc::new(RunCache::new()));
        let transformer = Transformer::new(&client, "Default");

        let err = transformer
            .transform_node(&raw(json!({"id": 4, "identifier": ""})))
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::DataConsistency { .. }));
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_rejected() {
        let store = FakeStore::new("https://source.example");
        let client = store.client(Arc::new(RunCache::new()));
        let transformer = Transformer::new(&client, "Default");

        let node = raw(json!({
            "id": 4,
            "identifier": "x",
            "summary_fields": {
                "unified_job_template": {"name": "cleanup", "unified_job_type": "system_job"}
            }
        }));
        let err = transformer.transform_node(&node).await.unwrap_err();

        assert!(err.to_string().contains("system_job"));
    }
}
