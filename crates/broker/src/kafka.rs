//! Kafka implementations of the publisher and the subscription loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::Offset;
use rdkafka::TopicPartitionList;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{DeliveryPolicy, MessageHandler, MessagePublisher, deliver};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::message::{EVENT_ID_HEADER, InboundMessage, OutboundRecord};
use crate::topic::{ConsumerOperation, Topic};

/// Producer shared by every publish job.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let producer: FutureProducer = config.producer_config().create()?;
        tracing::info!(brokers = %config.brokers.join(","), "Kafka producer created");
        Ok(Self {
            producer,
            queue_timeout: config.message_timeout,
        })
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, record: OutboundRecord) -> Result<()> {
        let event_id = record.event_id.map(|id| id.to_string());
        let mut headers = OwnedHeaders::new();
        if let Some(id) = &event_id {
            headers = headers.insert(Header {
                key: EVENT_ID_HEADER,
                value: Some(id.as_str()),
            });
        }

        let future_record = FutureRecord::to(record.topic.as_str())
            .key(record.key.as_str())
            .payload(record.payload.as_slice())
            .headers(headers);

        self.producer
            .send(future_record, Timeout::After(self.queue_timeout))
            .await
            .map_err(|(e, _)| BrokerError::Unavailable(e.to_string()))?;

        tracing::debug!(
            topic = %record.topic,
            key = %record.key,
            "Published to Kafka"
        );
        Ok(())
    }
}

/// Runs one consumer group subscription until cancelled.
pub struct KafkaSubscriber {
    config: BrokerConfig,
    policy: DeliveryPolicy,
}

impl KafkaSubscriber {
    pub fn new(config: BrokerConfig, policy: DeliveryPolicy) -> Self {
        Self { config, policy }
    }

    /// Consumes `handler.operation().topic()` until `cancel` fires.
    ///
    /// Setup and commit errors are logged and the loop starts over after
    /// the configured reconnect delay.
    pub async fn run(&self, handler: Arc<dyn MessageHandler>, cancel: CancellationToken) {
        let operation = handler.operation();
        tracing::info!(
            operation = %operation,
            group_id = %self.config.group_id(operation),
            "Consumer started"
        );

        loop {
            match self.consume(handler.as_ref(), &cancel).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(
                        operation = %operation,
                        error = %e,
                        "Consumer loop failed, reconnecting"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }

        tracing::info!(operation = %operation, "Consumer stopped");
    }

    /// Returns `Ok(())` only on cancellation.
    async fn consume(&self, handler: &dyn MessageHandler, cancel: &CancellationToken) -> Result<()> {
        let operation = handler.operation();
        let topic = operation.topic();
        let consumer: StreamConsumer = self.config.consumer_config(operation).create()?;
        consumer.subscribe(&[topic.as_str()])?;

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = consumer.recv() => match received {
                    Ok(borrowed) => inbound(&borrowed, topic),
                    Err(e) => {
                        tracing::warn!(operation = %operation, error = %e, "Receive failed");
                        continue;
                    }
                },
            };

            let disposition = deliver(handler, &message, &self.policy).await;
            if disposition.should_commit() {
                commit(&consumer, &message, operation)?;
            }
        }
    }
}

fn inbound(borrowed: &BorrowedMessage<'_>, topic: Topic) -> InboundMessage {
    let event_id = borrowed
        .headers()
        .and_then(|headers| headers.iter().find(|h| h.key == EVENT_ID_HEADER))
        .and_then(|h| h.value)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| Uuid::parse_str(s).ok());

    InboundMessage {
        topic,
        key: borrowed
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned()),
        event_id,
        payload: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        partition: borrowed.partition(),
        offset: borrowed.offset(),
    }
}

fn commit(
    consumer: &StreamConsumer,
    message: &InboundMessage,
    operation: ConsumerOperation,
) -> Result<()> {
    let mut offsets = TopicPartitionList::new();
    offsets.add_partition_offset(
        message.topic.as_str(),
        message.partition,
        Offset::Offset(message.offset + 1),
    )?;
    consumer.commit(&offsets, CommitMode::Async)?;
    tracing::trace!(
        operation = %operation,
        partition = message.partition,
        offset = message.offset,
        "Offset committed"
    );
    Ok(())
}
