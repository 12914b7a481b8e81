//! Portable, name-keyed entity representation

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::{EntityType, WorkflowNode};
use crate::transfer::Relation;

/// Reference to another entity by its stable name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameRef {
    pub kind: EntityType,
    pub name: String,
}

impl NameRef {
    pub fn new(kind: EntityType, name: impl Into<String>) -> Self {
        NameRef {
            kind,
            name: name.into(),
        }
    }
}

/// Reference to an entity by its identifier on the destination store
///
/// Only produced by reconciliation; a `PortableEntity` never holds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdRef {
    pub kind: EntityType,
    pub id: i64,
}

/// Transformed content of one relation
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Associated entities, by name
    Names(Vec<NameRef>),
    /// Survey specification, verbatim (empty object when surveys are off)
    Survey(Value),
    /// Nodes of a workflow template
    Nodes(Vec<WorkflowNode>),
}

/// Identifier-free form of an entity, suitable for export or re-creation
#[derive(Debug, Clone, PartialEq)]
pub struct PortableEntity {
    pub kind: EntityType,
    /// Kept and decoded scalar or structured fields
    pub fields: BTreeMap<String, Value>,
    /// Foreign keys resolved to names, including the injected organization
    pub references: BTreeMap<String, NameRef>,
    pub related: BTreeMap<Relation, Related>,
    /// Source text of decoded variable fields, sent verbatim on migrate
    ///
    /// Never exported; decoding is lossy for comments and YAML 1.1 scalars.
    pub source_text: BTreeMap<String, String>,
}

impl PortableEntity {
    pub fn new(kind: EntityType) -> Self {
        PortableEntity {
            kind,
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
            related: BTreeMap::new(),
            source_text: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn display_name(&self) -> String {
        self.name().unwrap_or("<unnamed>").to_string()
    }

    pub fn reference(&self, field: &str) -> Option<&NameRef> {
        self.references.get(field)
    }

    /// Names attached through a relation, empty if the relation is absent
    pub fn related_names(&self, relation: Relation) -> &[NameRef] {
        match self.related.get(&relation) {
            Some(Related::Names(names)) => names,
            _ => &[],
        }
    }

    pub fn workflow_nodes(&self) -> &[WorkflowNode] {
        match self.related.get(&Relation::WorkflowNodes) {
            Some(Related::Nodes(nodes)) => nodes,
            _ => &[],
        }
    }

    /// Every top-level key this entity exports
    pub fn document_keys(&self) -> Vec<&str> {
        self.document().into_keys().collect()
    }

    fn document(&self) -> BTreeMap<&str, DocumentValue<'_>> {
        let mut doc = BTreeMap::new();

        for (key, value) in &self.fields {
            doc.insert(key.as_str(), DocumentValue::Value(value));
        }
        for (key, reference) in &self.references {
            doc.insert(key.as_str(), DocumentValue::Name(&reference.name));
        }
        for (relation, related) in &self.related {
            let value = match related {
                Related::Names(names) => {
                    DocumentValue::Names(names.iter().map(|n| n.name.as_str()).collect())
                }
                Related::Survey(spec) => DocumentValue::Value(spec),
                Related::Nodes(nodes) => DocumentValue::Nodes(nodes),
            };
            doc.insert(relation.key(), value);
        }

        doc
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum DocumentValue<'a> {
    Value(&'a Value),
    Name(&'a str),
    Names(Vec<&'a str>),
    Nodes(&'a [WorkflowNode]),
}

/// Serializes as one flat mapping: references become names, relations
/// become lists keyed by relation name
impl Serialize for PortableEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document().serialize(serializer)
    }
}
