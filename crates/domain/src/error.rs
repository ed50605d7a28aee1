//! Domain error types.

use event_log::EventLogError;
use thiserror::Error;

/// Errors returned by order commands and store operations.
///
/// The four variants are the whole taxonomy callers need to branch on;
/// the message carries the human-readable detail.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The command is structurally invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced order or product does not exist (or is not visible to the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The command is valid but the current state forbids it.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage or infrastructure failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Internal(_) => "internal_error",
        }
    }

    /// The detail without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            DomainError::Validation(m)
            | DomainError::NotFound(m)
            | DomainError::Conflict(m)
            | DomainError::Internal(m) => m,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }
}

impl From<EventLogError> for DomainError {
    fn from(e: EventLogError) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(e: sqlx::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<common::UnknownStatus> for DomainError {
    fn from(e: common::UnknownStatus) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
