//! Static per-type transfer rules
//!
//! Each entity type gets one `CatalogRule` describing which fields survive
//! the transfer, which fields are foreign keys to be rewritten as names and
//! which relations travel with the entity.

use crate::transfer::{EntityType, RawEntity};

/// Fields never used as exact-match search filters
///
/// Free text and structured blobs either fail equality matching on the
/// server or are not filterable at all.
pub const UNSAFE_FILTER_FIELDS: &[&str] = &[
    "extra_vars",
    "host_config_key",
    "inputs",
    "scm_branch",
    "variables",
    "source_vars",
    "survey_spec",
];

/// Webhook providers whose settings are carried over
pub const WEBHOOK_PROVIDERS: &[&str] = &["github", "gitlab"];

/// A field holding the id of another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub target: EntityType,
}

const fn fk(field: &'static str, target: EntityType) -> ForeignKey {
    ForeignKey { field, target }
}

/// Sub-entities fetched with their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Credentials,
    SurveySpec,
    WorkflowNodes,
    Groups,
    Hosts,
}

impl Relation {
    /// Key in exported documents and in the API's `related` block
    pub fn key(&self) -> &'static str {
        match self {
            Relation::Credentials => "credentials",
            Relation::SurveySpec => "survey_spec",
            Relation::WorkflowNodes => "workflow_nodes",
            Relation::Groups => "groups",
            Relation::Hosts => "hosts",
        }
    }

    /// Entity type on the other end, if the relation points at entities
    pub fn target(&self) -> Option<EntityType> {
        match self {
            Relation::Credentials => Some(EntityType::Credential),
            Relation::SurveySpec => None,
            Relation::WorkflowNodes => Some(EntityType::WorkflowNode),
            Relation::Groups => Some(EntityType::Group),
            Relation::Hosts => Some(EntityType::Host),
        }
    }

    /// Relations established by posting `{id}` once the parent exists
    pub fn is_link_after_create(&self) -> bool {
        matches!(
            self,
            Relation::Credentials | Relation::Groups | Relation::Hosts
        )
    }

    /// Relations whose lookups are scoped by the parent's inventory
    pub fn is_inventory_scoped(&self) -> bool {
        matches!(self, Relation::Groups | Relation::Hosts)
    }
}

/// Small per-type adjustment applied on top of the generic rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHook {
    None,
    /// Drop webhook settings unless the provider is supported
    Webhook,
    /// Rebuild the launched template and sibling edges
    WorkflowNode,
}

impl TypeHook {
    /// Fields this hook withholds from the transfer of `raw`
    pub fn excluded_fields(&self, raw: &RawEntity) -> &'static [&'static str] {
        match self {
            TypeHook::Webhook => {
                let provider = raw
                    .get("webhook_service")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if WEBHOOK_PROVIDERS.contains(&provider) {
                    &[]
                } else {
                    &["webhook_service", "webhook_credential"]
                }
            }
            TypeHook::None | TypeHook::WorkflowNode => &[],
        }
    }
}

/// Transfer rule for one entity type
#[derive(Debug, Clone, Copy)]
pub struct CatalogRule {
    pub kind: EntityType,
    pub keep_fields: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    /// Text fields holding serialized variables
    pub decoded_fields: &'static [&'static str],
    pub related: &'static [Relation],
    pub survey_supported: bool,
    pub organization_scoped: bool,
    pub hook: TypeHook,
}

impl CatalogRule {
    pub fn is_decoded(&self, field: &str) -> bool {
        self.decoded_fields.contains(&field)
    }

    /// Fields a portable entity of this type may carry
    pub fn allowed_fields(&self) -> Vec<&'static str> {
        let mut allowed: Vec<&'static str> = self.keep_fields.to_vec();
        allowed.extend(self.foreign_keys.iter().map(|f| f.field));
        allowed.extend(self.related.iter().map(|r| r.key()));
        if self.organization_scoped {
            allowed.push("organization");
        }
        if self.hook == TypeHook::WorkflowNode {
            allowed.extend(["unified_job_template", "related"]);
        }
        allowed
    }
}

static ORGANIZATION: CatalogRule = CatalogRule {
    kind: EntityType::Organization,
    keep_fields: &["name", "description", "max_hosts"],
    foreign_keys: &[],
    decoded_fields: &[],
    related: &[],
    survey_supported: false,
    organization_scoped: false,
    hook: TypeHook::None,
};

static CREDENTIAL_TYPE: CatalogRule = CatalogRule {
    kind: EntityType::CredentialType,
    keep_fields: &["name", "description", "kind", "inputs", "injectors"],
    foreign_keys: &[],
    decoded_fields: &[],
    related: &[],
    survey_supported: false,
    organization_scoped: false,
    hook: TypeHook::None,
};

static CREDENTIAL: CatalogRule = CatalogRule {
    kind: EntityType::Credential,
    keep_fields: &["name", "description"],
    foreign_keys: &[fk("credential_type", EntityType::CredentialType)],
    decoded_fields: &[],
    related: &[],
    survey_supported: false,
    organization_scoped: true,
    hook: TypeHook::None,
};

static PROJECT: CatalogRule = CatalogRule {
    kind: EntityType::Project,
    keep_fields: &[
        "name",
        "description",
        "scm_type",
        "scm_url",
        "scm_branch",
        "scm_refspec",
        "scm_clean",
        "scm_track_submodules",
        "scm_delete_on_update",
        "scm_update_on_launch",
        "scm_update_cache_timeout",
        "allow_override",
        "timeout",
    ],
    foreign_keys: &[fk("credential", EntityType::Credential)],
    decoded_fields: &[],
    related: &[],
    survey_supported: false,
    organization_scoped: true,
    hook: TypeHook::None,
};

static INVENTORY: CatalogRule = CatalogRule {
    kind: EntityType::Inventory,
    keep_fields: &[
        "name",
        "kind",
        "description",
        "host_filter",
        "variables",
        "prevent_instance_group_fallback",
    ],
    foreign_keys: &[],
    decoded_fields: &["variables"],
    related: &[],
    survey_supported: false,
    organization_scoped: true,
    hook: TypeHook::None,
};

static INVENTORY_SOURCE: CatalogRule = CatalogRule {
    kind: EntityType::InventorySource,
    keep_fields: &[
        "name",
        "description",
        "enabled_value",
        "enabled_var",
        "host_filter",
        "limit",
        "overwrite",
        "overwrite_vars",
        "scm_branch",
        "source",
        "source_path",
        "source_vars",
        "timeout",
        "update_cache_timeout",
        "update_on_launch",
        "verbosity",
    ],
    foreign_keys: &[
        fk("inventory", EntityType::Inventory),
        fk("source_project", EntityType::Project),
        fk("credential", EntityType::Credential),
    ],
    decoded_fields: &["source_vars"],
    related: &[],
    survey_supported: false,
    organization_scoped: true,
    hook: TypeHook::None,
};

static GROUP: CatalogRule = CatalogRule {
    kind: EntityType::Group,
    keep_fields: &["name", "description", "variables"],
    foreign_keys: &[fk("inventory", EntityType::Inventory)],
    decoded_fields: &["variables"],
    related: &[Relation::Hosts],
    survey_supported: false,
    organization_scoped: false,
    hook: TypeHook::None,
};

static HOST: CatalogRule = CatalogRule {
    kind: EntityType::Host,
    keep_fields: &["name", "description", "enabled", "instance_id", "variables"],
    foreign_keys: &[fk("inventory", EntityType::Inventory)],
    decoded_fields: &["variables"],
    related: &[Relation::Groups],
    survey_supported: false,
    organization_scoped: false,
    hook: TypeHook::None,
};

static JOB_TEMPLATE: CatalogRule = CatalogRule {
    kind: EntityType::JobTemplate,
    keep_fields: &[
        "name",
        "description",
        "job_type",
        "playbook",
        "scm_branch",
        "forks",
        "limit",
        "verbosity",
        "extra_vars",
        "job_tags",
        "force_handlers",
        "skip_tags",
        "start_at_task",
        "timeout",
        "use_fact_cache",
        "host_config_key",
        "ask_scm_branch_on_launch",
        "ask_diff_mode_on_launch",
        "ask_variables_on_launch",
        "ask_limit_on_launch",
        "ask_tags_on_launch",
        "ask_skip_tags_on_launch",
        "ask_job_type_on_launch",
        "ask_verbosity_on_launch",
        "ask_inventory_on_launch",
        "ask_credential_on_launch",
        "survey_enabled",
        "become_enabled",
        "diff_mode",
        "allow_simultaneous",
        "job_slice_count",
        "webhook_service",
    ],
    foreign_keys: &[
        fk("inventory", EntityType::Inventory),
        fk("project", EntityType::Project),
        fk("webhook_credential", EntityType::Credential),
    ],
    decoded_fields: &["extra_vars"],
    related: &[Relation::Credentials, Relation::SurveySpec],
    survey_supported: true,
    organization_scoped: true,
    hook: TypeHook::Webhook,
};

static WORKFLOW_JOB_TEMPLATE: CatalogRule = CatalogRule {
    kind: EntityType::WorkflowJobTemplate,
    keep_fields: &[
        "name",
        "description",
        "scm_branch",
        "limit",
        "survey_enabled",
        "extra_vars",
        "ask_scm_branch_on_launch",
        "ask_variables_on_launch",
        "ask_limit_on_launch",
        "ask_skip_tags_on_launch",
        "ask_tags_on_launch",
        "ask_inventory_on_launch",
        "allow_simultaneous",
        "job_tags",
        "skip_tags",
        "webhook_service",
    ],
    foreign_keys: &[
        fk("inventory", EntityType::Inventory),
        fk("webhook_credential", EntityType::Credential),
    ],
    decoded_fields: &["extra_vars"],
    related: &[Relation::SurveySpec, Relation::WorkflowNodes],
    survey_supported: true,
    organization_scoped: true,
    hook: TypeHook::Webhook,
};

static WORKFLOW_NODE: CatalogRule = CatalogRule {
    kind: EntityType::WorkflowNode,
    keep_fields: &["identifier", "all_parents_must_converge"],
    foreign_keys: &[],
    decoded_fields: &[],
    related: &[],
    survey_supported: false,
    organization_scoped: true,
    hook: TypeHook::WorkflowNode,
};

/// Look up the transfer rule for an entity type
pub fn rule(kind: EntityType) -> &'static CatalogRule {
    match kind {
        EntityType::Organization => &ORGANIZATION,
        EntityType::CredentialType => &CREDENTIAL_TYPE,
        EntityType::Credential => &CREDENTIAL,
        EntityType::Project => &PROJECT,
        EntityType::Inventory => &INVENTORY,
        EntityType::InventorySource => &INVENTORY_SOURCE,
        EntityType::Group => &GROUP,
        EntityType::Host => &HOST,
        EntityType::JobTemplate => &JOB_TEMPLATE,
        EntityType::WorkflowJobTemplate => &WORKFLOW_JOB_TEMPLATE,
        EntityType::WorkflowNode => &WORKFLOW_NODE,
    }
}
