//! Workflow node graph types
//!
//! Nodes of one workflow reference their siblings by `identifier`, which is
//! only unique inside the parent workflow.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use super::EntityType;

/// Kind of edge between two nodes of the same workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    AlwaysNodes,
    SuccessNodes,
    FailureNodes,
}

impl EdgeKind {
    pub fn all_variants() -> &'static [EdgeKind] {
        &[
            EdgeKind::AlwaysNodes,
            EdgeKind::SuccessNodes,
            EdgeKind::FailureNodes,
        ]
    }

    /// Field and relation name used by the API
    pub fn key(&self) -> &'static str {
        match self {
            EdgeKind::AlwaysNodes => "always_nodes",
            EdgeKind::SuccessNodes => "success_nodes",
            EdgeKind::FailureNodes => "failure_nodes",
        }
    }
}

/// Reference to a sibling node by its workflow-scoped identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub identifier: String,
}

/// Normalized kind of the job a node launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    JobTemplate,
    WorkflowJobTemplate,
    WorkflowApproval,
    Project,
    InventorySource,
}

impl JobKind {
    /// Map the API's `unified_job_type` onto a template kind
    pub fn from_unified_job_type(job_type: &str) -> Option<Self> {
        match job_type {
            "job" => Some(JobKind::JobTemplate),
            "workflow_job" => Some(JobKind::WorkflowJobTemplate),
            "workflow_approval" => Some(JobKind::WorkflowApproval),
            "project_update" => Some(JobKind::Project),
            "inventory_update" => Some(JobKind::InventorySource),
            _ => None,
        }
    }

    /// Entity type the node's template lives in; approvals have none
    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            JobKind::JobTemplate => Some(EntityType::JobTemplate),
            JobKind::WorkflowJobTemplate => Some(EntityType::WorkflowJobTemplate),
            JobKind::Project => Some(EntityType::Project),
            JobKind::InventorySource => Some(EntityType::InventorySource),
            JobKind::WorkflowApproval => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Named {
    pub name: String,
}

impl Named {
    pub fn new(name: impl Into<String>) -> Self {
        Named { name: name.into() }
    }
}

/// Name-based description of the template a node launches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedJobDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub organization: Named,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Named>,
}

/// A transformed workflow node with its sibling edges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowNode {
    pub identifier: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    pub organization: String,
    pub unified_job_template: UnifiedJobDescriptor,
    pub related: BTreeMap<EdgeKind, Vec<NodeRef>>,
}

impl WorkflowNode {
    /// Sibling identifiers in edge order
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKind, &str)> {
        self.related
            .iter()
            .flat_map(|(kind, refs)| refs.iter().map(move |r| (*kind, r.identifier.as_str())))
    }
}

/// An edge pointing at an identifier that is not part of the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    pub from: String,
    pub edge: EdgeKind,
    pub to: String,
}

impl std::fmt::Display for DanglingEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "node '{}' has {} edge to unknown node '{}'",
            self.from,
            self.edge.key(),
            self.to
        )
    }
}

/// Verify every sibling reference resolves inside the same node set
pub fn check_node_references(nodes: &[WorkflowNode]) -> Result<(), DanglingEdge> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.identifier.as_str()).collect();

    for node in nodes {
        for (edge, target) in node.edges() {
            if !known.contains(target) {
                return Err(DanglingEdge {
                    from: node.identifier.clone(),
                    edge,
                    to: target.to_string(),
                });
            }
        }
    }

    Ok(())
}
