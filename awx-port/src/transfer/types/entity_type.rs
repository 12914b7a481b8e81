//! Entity type tags and their default API locations

use std::str::FromStr;

/// Kind of configuration entity handled by the migrator
///
/// Variants are declared in dependency order: an entity only references
/// entities of kinds declared before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Organization,
    CredentialType,
    Credential,
    Project,
    Inventory,
    InventorySource,
    Group,
    Host,
    JobTemplate,
    WorkflowJobTemplate,
    WorkflowNode,
}

impl EntityType {
    /// Get all variants in dependency order
    pub fn all_variants() -> &'static [EntityType] {
        &[
            EntityType::Organization,
            EntityType::CredentialType,
            EntityType::Credential,
            EntityType::Project,
            EntityType::Inventory,
            EntityType::InventorySource,
            EntityType::Group,
            EntityType::Host,
            EntityType::JobTemplate,
            EntityType::WorkflowJobTemplate,
            EntityType::WorkflowNode,
        ]
    }

    /// Canonical key used on the command line and in config files
    pub fn key(&self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::CredentialType => "credential_type",
            EntityType::Credential => "credential",
            EntityType::Project => "project",
            EntityType::Inventory => "inventory",
            EntityType::InventorySource => "inventory_source",
            EntityType::Group => "group",
            EntityType::Host => "host",
            EntityType::JobTemplate => "job_template",
            EntityType::WorkflowJobTemplate => "workflow_job_template",
            EntityType::WorkflowNode => "workflow_node",
        }
    }

    /// Older spellings accepted for compatibility with existing scripts
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            EntityType::Organization => &["organizations"],
            EntityType::CredentialType => &["credential_types"],
            EntityType::Credential => &["credentials"],
            EntityType::Project => &["projects"],
            EntityType::Inventory => &["inventories"],
            EntityType::InventorySource => &["inventory_sources"],
            EntityType::Group => &["groups"],
            EntityType::Host => &["hosts"],
            EntityType::JobTemplate => &["job_templates"],
            EntityType::WorkflowJobTemplate => &["workflow_job_templates"],
            EntityType::WorkflowNode => &["workflow_nodes", "workflow_job_template_nodes"],
        }
    }

    /// Default collection endpoint, relative to the store root
    pub fn default_base_url(&self) -> &'static str {
        match self {
            EntityType::Organization => "/api/v2/organizations/",
            EntityType::CredentialType => "/api/v2/credential_types/",
            EntityType::Credential => "/api/v2/credentials/",
            EntityType::Project => "/api/v2/projects/",
            EntityType::Inventory => "/api/v2/inventories/",
            EntityType::InventorySource => "/api/v2/inventory_sources/",
            EntityType::Group => "/api/v2/groups/",
            EntityType::Host => "/api/v2/hosts/",
            EntityType::JobTemplate => "/api/v2/job_templates/",
            EntityType::WorkflowJobTemplate => "/api/v2/workflow_job_templates/",
            EntityType::WorkflowNode => "/api/v2/workflow_job_template_nodes/",
        }
    }

    /// Comma separated list of canonical keys, for error messages
    pub fn valid_keys() -> String {
        Self::all_variants()
            .iter()
            .map(|t| t.key())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when a string does not name an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityType(pub String);

impl std::fmt::Display for UnknownEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unknown entity type '{}'. Valid types are: {}",
            self.0,
            EntityType::valid_keys()
        )
    }
}

impl std::error::Error for UnknownEntityType {}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        EntityType::all_variants()
            .iter()
            .copied()
            .find(|t| t.key() == needle || t.aliases().contains(&needle.as_str()))
            .ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_and_alias() {
        assert_eq!("host".parse::<EntityType>().unwrap(), EntityType::Host);
        assert_eq!("hosts".parse::<EntityType>().unwrap(), EntityType::Host);
        assert_eq!(
            "workflow_job_template_nodes".parse::<EntityType>().unwrap(),
            EntityType::WorkflowNode
        );
        assert_eq!("Job_Template".parse::<EntityType>().unwrap(), EntityType::JobTemplate);
    }

    #[test]
    fn test_unknown_type_lists_valid_keys() {
        let err = "widgets".parse::<EntityType>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("widgets"));
        assert!(message.contains("job_template"));
        assert!(message.contains("workflow_node"));
    }

    #[test]
    fn test_keys_round_trip() {
        for kind in EntityType::all_variants() {
            assert_eq!(kind.key().parse::<EntityType>().unwrap(), *kind);
            assert!(kind.default_base_url().starts_with("/api/v2/"));
        }
    }
}
