//! Error taxonomy for retrieval, transformation and reconciliation

use crate::transfer::EntityType;

/// Errors raised while moving entities between stores
///
/// Transport and data-consistency errors stop the entity being processed;
/// the driver catches them at the entity boundary and moves on. Only
/// configuration errors found before any work starts abort a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PortError {
    /// Network failure or an unexpected HTTP status from a remote store
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },
    /// Source data is internally inconsistent (e.g. a reference without its summary)
    DataConsistency {
        kind: EntityType,
        name: String,
        message: String,
    },
    /// Create, lookup or link failed on the destination for one entity
    Reconciliation {
        kind: EntityType,
        name: String,
        message: String,
    },
    /// Bad settings, unknown entity type or missing secret material
    Config(String),
}

impl PortError {
    pub fn transport(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        PortError::Transport {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub fn data(kind: EntityType, name: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::DataConsistency {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn reconciliation(
        kind: EntityType,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PortError::Reconciliation {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run rather than a single entity
    pub fn is_fatal(&self) -> bool {
        matches!(self, PortError::Config(_))
    }
}

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortError::Transport {
                url,
                status: Some(status),
                message,
            } => write!(f, "HTTP {} from {}: {}", status, url, message),
            PortError::Transport {
                url,
                status: None,
                message,
            } => write!(f, "Request to {} failed: {}", url, message),
            PortError::DataConsistency { kind, name, message } => {
                write!(f, "Inconsistent source data for {} '{}': {}", kind, name, message)
            }
            PortError::Reconciliation { kind, name, message } => {
                write!(f, "Could not reconcile {} '{}': {}", kind, name, message)
            }
            PortError::Config(message) => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for PortError {}
