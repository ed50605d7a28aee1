//! Typed event payloads and their mapping onto the three JSON columns.

use common::{Money, OrderStatus, PaymentMethod, PaymentStatus, ShippingStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EventLogError, EventType, Result};

/// Current payload schema version written with every row.
pub const SCHEMA_VERSION: i16 = 1;

/// Intended payment, captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub payment_uuid: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

/// Intended shipping, captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    pub shipping_uuid: Uuid,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub status: ShippingStatus,
}

/// A bare status change for payment, shipping or the order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot<S> {
    pub status: S,
}

impl<S> StatusSnapshot<S> {
    pub fn new(status: S) -> Self {
        Self { status }
    }
}

/// What an event asks downstream consumers to do.
///
/// Each variant carries exactly the snapshots its event type needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    OrderCreated {
        payment: PaymentSnapshot,
        shipping: ShippingSnapshot,
    },
    OrderCancelled {
        payment: StatusSnapshot<PaymentStatus>,
        shipping: StatusSnapshot<ShippingStatus>,
    },
    PaymentProcessed {
        payment: StatusSnapshot<PaymentStatus>,
    },
    ShippingProcessed {
        order: StatusSnapshot<OrderStatus>,
    },
    OrderProcessed {
        order: StatusSnapshot<OrderStatus>,
    },
    OrderDelivered {
        order: StatusSnapshot<OrderStatus>,
    },
}

/// The persisted form: one optional JSON document per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadColumns {
    pub payment_data: Option<serde_json::Value>,
    pub shipping_data: Option<serde_json::Value>,
    pub order_data: Option<serde_json::Value>,
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::OrderCreated { .. } => EventType::OrderCreated,
            EventPayload::OrderCancelled { .. } => EventType::OrderCancelled,
            EventPayload::PaymentProcessed { .. } => EventType::PaymentProcessed,
            EventPayload::ShippingProcessed { .. } => EventType::ShippingProcessed,
            EventPayload::OrderProcessed { .. } => EventType::OrderProcessed,
            EventPayload::OrderDelivered { .. } => EventType::OrderDelivered,
        }
    }

    /// Splits the payload into the `payment_data`, `shipping_data` and
    /// `order_data` columns. Columns the event type does not use stay `None`.
    pub fn to_columns(&self) -> Result<PayloadColumns> {
        let mut columns = PayloadColumns::default();
        match self {
            EventPayload::OrderCreated { payment, shipping } => {
                columns.payment_data = Some(serde_json::to_value(payment)?);
                columns.shipping_data = Some(serde_json::to_value(shipping)?);
            }
            EventPayload::OrderCancelled { payment, shipping } => {
                columns.payment_data = Some(serde_json::to_value(payment)?);
                columns.shipping_data = Some(serde_json::to_value(shipping)?);
            }
            EventPayload::PaymentProcessed { payment } => {
                columns.payment_data = Some(serde_json::to_value(payment)?);
            }
            EventPayload::ShippingProcessed { order }
            | EventPayload::OrderProcessed { order }
            | EventPayload::OrderDelivered { order } => {
                columns.order_data = Some(serde_json::to_value(order)?);
            }
        }
        Ok(columns)
    }

    /// Rebuilds a payload from its stored columns.
    pub fn from_columns(
        event_type: EventType,
        schema_version: i16,
        columns: PayloadColumns,
    ) -> Result<Self> {
        if schema_version > SCHEMA_VERSION {
            return Err(EventLogError::UnsupportedSchema {
                found: schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        let PayloadColumns {
            payment_data,
            shipping_data,
            order_data,
        } = columns;

        let payload = match event_type {
            EventType::OrderCreated => EventPayload::OrderCreated {
                payment: column(event_type, "payment_data", payment_data)?,
                shipping: column(event_type, "shipping_data", shipping_data)?,
            },
            EventType::OrderCancelled => EventPayload::OrderCancelled {
                payment: column(event_type, "payment_data", payment_data)?,
                shipping: column(event_type, "shipping_data", shipping_data)?,
            },
            EventType::PaymentProcessed => EventPayload::PaymentProcessed {
                payment: column(event_type, "payment_data", payment_data)?,
            },
            EventType::ShippingProcessed => EventPayload::ShippingProcessed {
                order: column(event_type, "order_data", order_data)?,
            },
            EventType::OrderProcessed => EventPayload::OrderProcessed {
                order: column(event_type, "order_data", order_data)?,
            },
            EventType::OrderDelivered => EventPayload::OrderDelivered {
                order: column(event_type, "order_data", order_data)?,
            },
        };
        Ok(payload)
    }
}

fn column<T: DeserializeOwned>(
    event_type: EventType,
    name: &'static str,
    value: Option<serde_json::Value>,
) -> Result<T> {
    match value {
        Some(serde_json::Value::Null) | None => Err(EventLogError::MissingPayload {
            event_type,
            column: name,
        }),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}
