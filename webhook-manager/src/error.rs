//! Error types for registry operations.
//!
//! Every variant is recoverable: the operation boundary turns it into an
//! error notification and a JSON-RPC error reply, and the registry stays
//! usable afterwards.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A required field was empty after trimming.
    #[error("missing required field: {field}")]
    Validation { field: &'static str },

    /// Another webhook already uses this name, ignoring case.
    #[error("a webhook named \"{0}\" already exists")]
    DuplicateName(String),

    /// The referenced webhook no longer exists.
    #[error("webhook not found: {0}")]
    NotFound(String),

    /// The operation needs the webhook to be selected first.
    #[error("no webhook selected")]
    NoSelection,

    /// A different webhook is currently selected.
    #[error("webhook {0} is not the selected webhook")]
    NotSelected(String),

    #[error("test delivery failed: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RegistryError {
    /// JSON-RPC error code reported to the host for this error kind.
    pub fn code(&self) -> i64 {
        match self {
            Self::Validation { .. } => -32010,
            Self::DuplicateName(_) => -32011,
            Self::NotFound(_) | Self::NoSelection | Self::NotSelected(_) => -32012,
            Self::Transport(_) => -32014,
            Self::Storage(_) | Self::Serialization(_) => -32015,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
