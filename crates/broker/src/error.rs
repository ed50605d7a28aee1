//! Broker error types.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors raised while producing, consuming or handling broker messages.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// The broker could not be reached or refused the record.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The message body does not match the topic schema. Never retried.
    #[error("Failed to decode message: {0}")]
    Decode(String),

    /// A handler could not apply a decoded message.
    #[error("Handler failed: {0}")]
    Handler(String),
}

impl BrokerError {
    /// Whether redelivering the same message could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BrokerError::Decode(_) | BrokerError::Encode(_))
    }
}

/// Convenience type alias for broker results.
pub type Result<T> = std::result::Result<T, BrokerError>;
