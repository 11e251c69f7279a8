//! Domain-specific error types for fork-mind

use thiserror::Error;

/// Main error type for the fork-mind decision core
#[derive(Error, Debug)]
pub enum ForkMindError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A proposal tried to touch a non-whitelisted field, leave a field's
    /// declared range, or move a field further than its step bound.
    #[error("Bounds violation on {field}: {reason}")]
    BoundsViolation { field: String, reason: String },

    #[error("Missing validation target: fork {fork_id} is unknown")]
    MissingValidationTarget { fork_id: String },

    #[error("Stale base version: proposal built on v{expected}, active is v{active}")]
    StaleBase { expected: u64, active: u64 },

    #[error("Unknown configuration version: v{version} is not retained")]
    UnknownVersion { version: u64 },

    #[error("Belief store error: {message}")]
    Belief { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation queue closed")]
    QueueClosed,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ForkMindError {
    pub fn bounds(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ForkMindError::BoundsViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the error kinds that reject a single proposal without
    /// affecting the rest of the process.
    pub fn is_proposal_fatal(&self) -> bool {
        matches!(
            self,
            ForkMindError::BoundsViolation { .. } | ForkMindError::StaleBase { .. }
        )
    }
}

impl From<anyhow::Error> for ForkMindError {
    fn from(err: anyhow::Error) -> Self {
        ForkMindError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ForkMindError {
    fn from(err: serde_json::Error) -> Self {
        ForkMindError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ForkMindError {
    fn from(err: toml::de::Error) -> Self {
        ForkMindError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for fork-mind operations
pub type Result<T> = std::result::Result<T, ForkMindError>;
