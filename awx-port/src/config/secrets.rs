//! Credential secret material
//!
//! Secrets never pass through the transform step, so exported documents
//! cannot leak them. They are merged into credential payloads only when
//! migrating.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecretEntry {
    pub inputs: Value,
}

/// Secret inputs keyed by credential name
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SecretSource {
    entries: HashMap<String, SecretEntry>,
}

impl SecretSource {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Secrets file does not exist: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
        let source: SecretSource = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {}", path.display()))?;

        log::info!("Loaded secrets for {} credentials", source.entries.len());
        Ok(source)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        SecretSource {
            entries: entries
                .into_iter()
                .map(|(name, inputs)| (name, SecretEntry { inputs }))
                .collect(),
        }
    }

    pub fn inputs_for(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.inputs)
    }
}
