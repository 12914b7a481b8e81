//! Run configuration
//!
//! Loaded once at startup from a YAML or TOML settings file and passed by
//! reference to every component. Nothing here is mutated after loading.

pub mod secrets;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use serde::Deserialize;

use crate::error::PortError;
use crate::transfer::EntityType;

pub use secrets::SecretSource;

pub const SOURCE_PASSWORD_ENV: &str = "AWX_PORT_SOURCE_PASSWORD";
pub const DESTINATION_PASSWORD_ENV: &str = "AWX_PORT_DESTINATION_PASSWORD";

/// Connection settings for one store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    #[serde(alias = "usr", alias = "user", default)]
    pub username: String,
    #[serde(alias = "pwd", default)]
    pub password: Option<String>,
    #[serde(alias = "verifyssl", default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(alias = "src_tower")]
    pub source: StoreConfig,
    /// Only required when migrating
    #[serde(alias = "dst_tower", default)]
    pub destination: Option<StoreConfig>,
    /// Extra HTTP headers sent with every request
    #[serde(alias = "standard_headers", default)]
    pub headers: BTreeMap<String, String>,
    /// Per-type collection endpoint overrides, keyed by entity type
    #[serde(alias = "baseurls", default)]
    pub base_urls: BTreeMap<String, String>,
    /// Organization every migrated entity is placed in
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout; unset leaves the transport default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_verify_ssl() -> bool {
    true
}

fn default_organization() -> String {
    "Default".to_string()
}

fn default_page_size() -> usize {
    200
}

impl Config {
    /// Load settings, then fill missing passwords from the environment or a prompt
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file does not exist: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let mut config = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        fill_password(&mut config.source, SOURCE_PASSWORD_ENV, "source")?;
        if let Some(destination) = config.destination.as_mut() {
            fill_password(destination, DESTINATION_PASSWORD_ENV, "destination")?;
        }

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Invalid YAML settings")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid TOML settings")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            anyhow::bail!("Source store url must not be empty");
        }
        if self.page_size == 0 {
            anyhow::bail!("page_size must be greater than zero");
        }
        self.endpoints()?;
        Ok(())
    }

    /// Collection endpoint per entity type, with overrides applied
    pub fn endpoints(&self) -> Result<BTreeMap<EntityType, String>, PortError> {
        let mut endpoints: BTreeMap<EntityType, String> = EntityType::all_variants()
            .iter()
            .map(|kind| (*kind, kind.default_base_url().to_string()))
            .collect();

        for (key, url) in &self.base_urls {
            let kind = key
                .parse::<EntityType>()
                .map_err(|e| PortError::Config(format!("In base URL overrides: {}", e)))?;
            endpoints.insert(kind, url.clone());
        }

        Ok(endpoints)
    }

    /// Destination settings, required in migrate mode
    pub fn destination(&self) -> Result<&StoreConfig, PortError> {
        self.destination.as_ref().ok_or_else(|| {
            PortError::Config("No destination store configured (dst_tower / destination)".into())
        })
    }
}

/// Take a missing password from the environment, else prompt on a terminal
fn fill_password(store: &mut StoreConfig, env_var: &str, role: &str) -> Result<()> {
    if store.password.is_some() || store.username.is_empty() {
        return Ok(());
    }

    if let Ok(password) = std::env::var(env_var) {
        store.password = Some(password);
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        let prompt = format!("Password for {} at {} ({}): ", store.username, store.url, role);
        let password = rpassword::prompt_password(prompt)
            .with_context(|| format!("Failed to read {} password", role))?;
        store.password = Some(password);
    } else {
        log::warn!(
            "No password for {} store {}; set {} to provide one",
            role,
            store.url,
            env_var
        );
    }

    Ok(())
}
