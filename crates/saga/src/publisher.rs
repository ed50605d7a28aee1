//! Publishes outbox events to the broker and records the outcome.

use std::time::Instant;

use broker::{
    MessagePublisher, OutboundRecord, PaymentMessage, ShippingMessage, StatusMessage, Topic,
};
use event_log::{EventLog, EventLogExt, EventPayload, EventStatus, OrderEvent};
use serde::Serialize;

use crate::error::{Result, SagaError};
use crate::retry::RetryPolicy;

/// Turns one `OrderEvent` into broker records, publishes them with bounded
/// retry, and marks the event `completed` or `failed`.
///
/// Partial progress is not tracked: if the second record of a two-record
/// event fails, the event is `failed` and a later run sends both again.
pub struct EventPublisher<L, P> {
    log: L,
    broker: P,
    retry: RetryPolicy,
}

impl<L: EventLog, P: MessagePublisher> EventPublisher<L, P> {
    pub fn new(log: L, broker: P, retry: RetryPolicy) -> Self {
        Self { log, broker, retry }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Publishes `event` and persists the outcome.
    ///
    /// A `completed` event is skipped. On failure the event is stored as
    /// `failed` with `"<Step> processing failed: <cause>"` and the error is
    /// returned.
    #[tracing::instrument(
        skip(self, event),
        fields(
            event_id = %event.event_id,
            order_id = %event.order_id,
            event_type = %event.event_type()
        )
    )]
    pub async fn publish(&self, event: &OrderEvent) -> Result<()> {
        if event.status == EventStatus::Completed {
            tracing::debug!("Event already completed, skipping");
            return Ok(());
        }

        let started = Instant::now();
        let result = self.send_all(event).await;
        metrics::histogram!("event_publish_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.log.mark_completed(event.event_id).await?;
                metrics::counter!("order_events_published_total").increment(1);
                tracing::info!("Event published");
                Ok(())
            }
            Err(SagaError::PublishFailed { topic, reason }) => {
                let message = format!("{} processing failed: {reason}", step_name(topic));
                self.log.mark_failed(event.event_id, message.clone()).await?;
                metrics::counter!("order_events_failed_total").increment(1);
                tracing::error!(topic = %topic, error = %message, "Event publish failed");
                Err(SagaError::PublishFailed { topic, reason })
            }
            Err(e) => {
                self.log.mark_failed(event.event_id, e.to_string()).await?;
                metrics::counter!("order_events_failed_total").increment(1);
                tracing::error!(error = %e, "Event could not be encoded");
                Err(e)
            }
        }
    }

    async fn send_all(&self, event: &OrderEvent) -> Result<()> {
        for record in records_for(event)? {
            let topic = record.topic;
            self.retry
                .run(|attempt| {
                    let record = record.clone();
                    async move {
                        metrics::counter!("publish_attempts_total").increment(1);
                        tracing::debug!(topic = %topic, attempt, "Publishing record");
                        self.broker.publish(record).await
                    }
                })
                .await
                .map_err(|e| SagaError::PublishFailed {
                    topic,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// The records an event fans out to, in publish order.
pub fn records_for(event: &OrderEvent) -> Result<Vec<OutboundRecord>> {
    let order_id = event.order_id;
    let records = match &event.payload {
        EventPayload::OrderCreated { payment, shipping } => vec![
            record(
                event,
                Topic::CreatePayment,
                &PaymentMessage {
                    payment_uuid: payment.payment_uuid,
                    order_id,
                    amount: payment.amount,
                    method: payment.method,
                    status: payment.status,
                },
            )?,
            record(
                event,
                Topic::CreateShipping,
                &ShippingMessage {
                    shipping_uuid: shipping.shipping_uuid,
                    order_id,
                    address: shipping.address.clone(),
                    city: shipping.city.clone(),
                    province: shipping.province.clone(),
                    postal_code: shipping.postal_code.clone(),
                    status: shipping.status,
                },
            )?,
        ],
        EventPayload::OrderCancelled { payment, shipping } => vec![
            record(
                event,
                Topic::CancelPayment,
                &StatusMessage::new(order_id, payment.status),
            )?,
            record(
                event,
                Topic::CancelShipping,
                &StatusMessage::new(order_id, shipping.status),
            )?,
        ],
        EventPayload::PaymentProcessed { payment } => vec![record(
            event,
            Topic::CheckoutPayment,
            &StatusMessage::new(order_id, payment.status),
        )?],
        EventPayload::ShippingProcessed { order }
        | EventPayload::OrderProcessed { order }
        | EventPayload::OrderDelivered { order } => vec![record(
            event,
            Topic::ChangeOrder,
            &StatusMessage::new(order_id, order.status),
        )?],
    };
    Ok(records)
}

fn record<T: Serialize>(event: &OrderEvent, topic: Topic, body: &T) -> Result<OutboundRecord> {
    Ok(OutboundRecord::json(
        topic,
        event.order_id,
        Some(event.event_id.as_uuid()),
        body,
    )?)
}

fn step_name(topic: Topic) -> &'static str {
    match topic {
        Topic::CreatePayment | Topic::CancelPayment | Topic::CheckoutPayment => "Payment",
        Topic::CreateShipping | Topic::CancelShipping => "Shipping",
        Topic::ChangeOrder => "Order",
    }
}
