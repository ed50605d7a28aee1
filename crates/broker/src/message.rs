//! Wire messages and the records that carry them.

use common::{Money, OrderId, PaymentMethod, PaymentStatus, ShippingStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BrokerError, Result};
use crate::topic::Topic;

/// Header carrying the originating event's UUID.
pub const EVENT_ID_HEADER: &str = "event-id";

/// Body of `create_payment_topic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMessage {
    pub payment_uuid: Uuid,
    pub order_id: OrderId,
    /// Minor currency units.
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

/// Body of `create_shipping_topic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMessage {
    pub shipping_uuid: Uuid,
    pub order_id: OrderId,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub status: ShippingStatus,
}

/// Body of the cancel, checkout and change-order topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage<S> {
    pub order_id: OrderId,
    pub status: S,
}

impl<S> StatusMessage<S> {
    pub fn new(order_id: OrderId, status: S) -> Self {
        Self { order_id, status }
    }
}

/// A record ready to be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: Topic,
    /// Partitioning key; the order id so one order's records stay ordered.
    pub key: String,
    pub event_id: Option<Uuid>,
    pub payload: Vec<u8>,
}

impl OutboundRecord {
    /// Serializes `body` as JSON, keyed by `order_id`.
    pub fn json<T: Serialize>(
        topic: Topic,
        order_id: OrderId,
        event_id: Option<Uuid>,
        body: &T,
    ) -> Result<Self> {
        Ok(Self {
            topic,
            key: order_id.to_string(),
            event_id,
            payload: serde_json::to_vec(body).map_err(BrokerError::Encode)?,
        })
    }
}

/// A record received from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub key: Option<String>,
    pub event_id: Option<Uuid>,
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

impl InboundMessage {
    /// Decodes the JSON body. Failures are reported as [`BrokerError::Decode`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|e| {
            BrokerError::Decode(format!(
                "{} at {}/{}: {e}",
                self.topic, self.partition, self.offset
            ))
        })
    }
}

impl From<OutboundRecord> for InboundMessage {
    fn from(record: OutboundRecord) -> Self {
        Self {
            topic: record.topic,
            key: Some(record.key),
            event_id: record.event_id,
            payload: record.payload,
            partition: 0,
            offset: 0,
        }
    }
}
