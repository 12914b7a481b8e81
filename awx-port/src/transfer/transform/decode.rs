//! Serialized variable blobs
//!
//! The API stores `variables` / `extra_vars` as YAML or JSON text. Portable
//! entities carry the parsed structure; `null` means "no variables" and is
//! distinct from an empty mapping.
//!
//! The API side reads these blobs with YAML 1.1 rules, where plain `yes`,
//! `no`, `on` and `off` are booleans. serde_yaml follows YAML 1.2 and keeps
//! them as strings, so decoded scalars are mapped back to booleans.

use serde_json::Value;

/// YAML 1.1 boolean scalars not recognised by YAML 1.2
const YAML11_TRUE: &[&str] = &["yes", "Yes", "YES", "on", "On", "ON"];
const YAML11_FALSE: &[&str] = &["no", "No", "NO", "off", "Off", "OFF"];

/// Parse a variables blob into structured form
pub fn decode_variables(value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Null),
        Value::String(text) => serde_yaml::from_str::<Value>(text)
            .map(yaml11_booleans)
            .map_err(|e| format!("cannot parse variables: {}", e)),
        // some endpoints already return structured variables
        other => Ok(other.clone()),
    }
}

fn yaml11_booleans(value: Value) -> Value {
    match value {
        Value::String(s) if YAML11_TRUE.contains(&s.as_str()) => Value::Bool(true),
        Value::String(s) if YAML11_FALSE.contains(&s.as_str()) => Value::Bool(false),
        Value::Array(items) => Value::Array(items.into_iter().map(yaml11_booleans).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, yaml11_booleans(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Serialize structured variables back into the text form the API accepts
pub fn encode_variables(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}
