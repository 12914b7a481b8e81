//! Source-side entity representation

use serde_json::{Map, Value};

/// One entity exactly as a remote store returned it
///
/// Holds numeric identifiers, foreign keys and the denormalized
/// `summary_fields` block. Read-only to the transfer pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    fields: Map<String, Value>,
}

impl RawEntity {
    /// Wrap a JSON value, returning None unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(RawEntity { fields }),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn id(&self) -> Option<i64> {
        self.fields.get("id").and_then(Value::as_i64)
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Name for log lines and error messages
    pub fn display_name(&self) -> String {
        match (self.name(), self.id()) {
            (Some(name), _) => name.to_string(),
            (None, Some(id)) => format!("#{}", id),
            (None, None) => "<unnamed>".to_string(),
        }
    }

    /// True when the field is present and carries a value
    ///
    /// Null, empty strings, empty lists and `false` all count as unset.
    pub fn is_set(&self, field: &str) -> bool {
        match self.fields.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Bool(b)) => *b,
            Some(_) => true,
        }
    }

    /// Denormalized summary of a referenced entity
    pub fn summary(&self, field: &str) -> Option<&Map<String, Value>> {
        self.fields
            .get("summary_fields")
            .and_then(|s| s.get(field))
            .and_then(Value::as_object)
    }

    pub fn summary_name(&self, field: &str) -> Option<&str> {
        self.summary(field)
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
    }

    /// Store-relative locator of a named relation
    pub fn related_url(&self, relation: &str) -> Option<&str> {
        self.fields
            .get("related")
            .and_then(|r| r.get(relation))
            .and_then(Value::as_str)
    }
}
