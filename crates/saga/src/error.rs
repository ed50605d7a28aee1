//! Saga error types.

use broker::{BrokerError, Topic};
use domain::DomainError;
use event_log::EventLogError;
use thiserror::Error;

/// Errors that can occur while publishing or consuming saga messages.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Every attempt to publish to a topic failed.
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed { topic: Topic, reason: String },

    /// Event log error.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Broker error.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
