use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::{DeliveryPolicy, Disposition, MessageHandler, MessagePublisher, deliver};
use crate::error::{BrokerError, Result};
use crate::message::{InboundMessage, OutboundRecord};
use crate::topic::Topic;

#[derive(Debug, Default)]
struct InMemoryBrokerState {
    published: Vec<OutboundRecord>,
    attempts: usize,
    unavailable: bool,
    failing_topics: HashSet<Topic>,
    failures_left: usize,
}

/// In-memory broker for tests.
///
/// Records every accepted record and can be told to refuse publishes,
/// either all of them, a number of upcoming ones, or those for given topics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<InMemoryBrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryBrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuses every publish while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Refuses the next `count` publishes.
    pub fn fail_next(&self, count: usize) {
        self.state().failures_left = count;
    }

    /// Refuses publishes to `topic` until [`InMemoryBroker::heal_topic`].
    pub fn fail_topic(&self, topic: Topic) {
        self.state().failing_topics.insert(topic);
    }

    pub fn heal_topic(&self, topic: Topic) {
        self.state().failing_topics.remove(&topic);
    }

    /// Every accepted record in publish order.
    pub fn published(&self) -> Vec<OutboundRecord> {
        self.state().published.clone()
    }

    pub fn published_to(&self, topic: Topic) -> Vec<OutboundRecord> {
        self.state()
            .published
            .iter()
            .filter(|r| r.topic == topic)
            .cloned()
            .collect()
    }

    /// Publish calls seen, accepted or not.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }

    /// Feeds every record published to the handler's topic through it, in
    /// order, as a subscriber would.
    pub async fn drain_to(
        &self,
        handler: &dyn MessageHandler,
        policy: &DeliveryPolicy,
    ) -> Vec<Disposition> {
        let records = self.published_to(handler.operation().topic());
        let mut dispositions = Vec::with_capacity(records.len());
        for (offset, record) in records.into_iter().enumerate() {
            let mut message = InboundMessage::from(record);
            message.offset = offset as i64;
            dispositions.push(deliver(handler, &message, policy).await);
        }
        dispositions
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, record: OutboundRecord) -> Result<()> {
        let mut state = self.state();
        state.attempts += 1;

        if state.unavailable {
            return Err(BrokerError::Unavailable("broker is down".to_string()));
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(BrokerError::Unavailable("injected failure".to_string()));
        }
        if state.failing_topics.contains(&record.topic) {
            return Err(BrokerError::Unavailable(format!(
                "topic {} is not accepting records",
                record.topic
            )));
        }

        state.published.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, PaymentStatus};

    use super::*;
    use crate::message::StatusMessage;

    fn record(topic: Topic) -> OutboundRecord {
        OutboundRecord::json(
            topic,
            OrderId::new(1),
            None,
            &StatusMessage::new(OrderId::new(1), PaymentStatus::Cancelled),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_records_published_messages() {
        let broker = InMemoryBroker::new();
        broker.publish(record(Topic::CancelPayment)).await.unwrap();
        broker.publish(record(Topic::CancelShipping)).await.unwrap();

        assert_eq!(broker.published().len(), 2);
        assert_eq!(broker.published_to(Topic::CancelShipping).len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let broker = InMemoryBroker::new();
        broker.fail_next(2);

        assert!(broker.publish(record(Topic::CancelPayment)).await.is_err());
        assert!(broker.publish(record(Topic::CancelPayment)).await.is_err());
        assert!(broker.publish(record(Topic::CancelPayment)).await.is_ok());
        assert_eq!(broker.attempts(), 3);
        assert_eq!(broker.published().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_topic_only_affects_that_topic() {
        let broker = InMemoryBroker::new();
        broker.fail_topic(Topic::CreateShipping);

        assert!(broker.publish(record(Topic::CreatePayment)).await.is_ok());
        let err = broker
            .publish(record(Topic::CreateShipping))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("create_shipping_topic"));

        broker.heal_topic(Topic::CreateShipping);
        assert!(broker.publish(record(Topic::CreateShipping)).await.is_ok());
    }
}
