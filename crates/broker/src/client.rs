//! Publisher and handler seams plus the shared acknowledgement policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BrokerError, Result};
use crate::message::{InboundMessage, OutboundRecord};
use crate::topic::ConsumerOperation;

/// Sends records to the broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Returns once the broker has acknowledged the record.
    async fn publish(&self, record: OutboundRecord) -> Result<()>;
}

/// What a handler did with a message it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Applied,
    /// Seen before under the same event id; nothing changed.
    Duplicate,
}

/// Applies messages from one subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn operation(&self) -> ConsumerOperation;

    /// Applies one message. Return [`BrokerError::Decode`] for bodies that
    /// can never be applied so the subscriber acknowledges and moves on.
    async fn handle(&self, message: &InboundMessage) -> Result<HandleOutcome>;
}

/// How the subscriber treats handler failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// The subscriber's verdict on one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Commit the offset.
    Ack(HandleOutcome),
    /// Undecodable; commit the offset so the partition is not blocked.
    Discard,
    /// Every attempt failed; leave the offset uncommitted.
    Unacked,
}

impl Disposition {
    pub fn should_commit(&self) -> bool {
        !matches!(self, Disposition::Unacked)
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            Disposition::Ack(HandleOutcome::Applied) => "applied",
            Disposition::Ack(HandleOutcome::Duplicate) => "duplicate",
            Disposition::Discard => "undecodable",
            Disposition::Unacked => "failed",
        }
    }
}

/// Runs `handler` on `message` under `policy` and records the outcome.
///
/// Retryable failures are retried after `retry_delay`. A decode failure is
/// never retried.
pub async fn deliver(
    handler: &dyn MessageHandler,
    message: &InboundMessage,
    policy: &DeliveryPolicy,
) -> Disposition {
    let operation = handler.operation();
    let mut attempt = 0;

    let disposition = loop {
        attempt += 1;
        match handler.handle(message).await {
            Ok(outcome) => break Disposition::Ack(outcome),
            Err(e @ BrokerError::Decode(_)) => {
                tracing::warn!(
                    operation = %operation,
                    offset = message.offset,
                    error = %e,
                    "Discarding undecodable message"
                );
                break Disposition::Discard;
            }
            Err(e) if !e.is_retryable() || attempt >= policy.max_attempts => {
                tracing::error!(
                    operation = %operation,
                    attempt,
                    offset = message.offset,
                    error = %e,
                    "Message handling failed, leaving offset uncommitted"
                );
                break Disposition::Unacked;
            }
            Err(e) => {
                tracing::warn!(
                    operation = %operation,
                    attempt,
                    error = %e,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    "Message handling failed, retrying after delay"
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    };

    metrics::counter!(
        "consumer_messages_total",
        "operation" => operation.as_str(),
        "outcome" => disposition.outcome_label()
    )
    .increment(1);
    disposition
}
