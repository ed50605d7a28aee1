use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EventLogError, EventPayload};

/// Unique identifier for an order event.
///
/// Travels with every broker message as the `event-id` header so
/// consumers can recognise redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::str::FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The kind of side effect an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OrderCreated,
    PaymentProcessed,
    ShippingProcessed,
    OrderProcessed,
    OrderCancelled,
    OrderDelivered,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "order_created",
            EventType::PaymentProcessed => "payment_processed",
            EventType::ShippingProcessed => "shipping_processed",
            EventType::OrderProcessed => "order_processed",
            EventType::OrderCancelled => "order_cancelled",
            EventType::OrderDelivered => "order_delivered",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_created" => Ok(EventType::OrderCreated),
            "payment_processed" => Ok(EventType::PaymentProcessed),
            "shipping_processed" => Ok(EventType::ShippingProcessed),
            "order_processed" => Ok(EventType::OrderProcessed),
            "order_cancelled" => Ok(EventType::OrderCancelled),
            "order_delivered" => Ok(EventType::OrderDelivered),
            other => Err(EventLogError::UnknownEventType(other.to_string())),
        }
    }
}

/// Publication status of an event.
///
/// ```text
/// Pending ──────────► Completed
///    │                    ▲
///    └──► Failed ─resubmit┘
///           ▲  │
///           └──┘ (failed again)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        }
    }

    /// Returns true if the publisher may record `next` over this status.
    ///
    /// Nothing ever moves back to `Pending`, and `Completed` is terminal.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (
                EventStatus::Pending | EventStatus::Failed,
                EventStatus::Completed | EventStatus::Failed
            )
        )
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "completed" => Ok(EventStatus::Completed),
            "failed" => Ok(EventStatus::Failed),
            other => Err(EventLogError::UnknownStatus(other.to_string())),
        }
    }
}

/// Result of one publish run, as recorded by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Completed,
    Failed(String),
}

impl EventOutcome {
    pub fn status(&self) -> EventStatus {
        match self {
            EventOutcome::Completed => EventStatus::Completed,
            EventOutcome::Failed(_) => EventStatus::Failed,
        }
    }
}

/// One row of the saga log.
///
/// The payload is a frozen snapshot taken when the order command ran and is
/// never re-derived from live order state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_id: EventId,
    pub order_id: OrderId,
    pub status: EventStatus,
    pub payload: EventPayload,
    pub error: Option<String>,
    /// Number of completed publish runs (each run makes up to N broker attempts).
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Creates a pending event stamped with the current time.
    pub fn new(event_id: EventId, order_id: OrderId, payload: EventPayload) -> Self {
        let now = Utc::now();
        Self {
            event_id,
            order_id,
            status: EventStatus::Pending,
            payload,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overrides the creation time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Applies an outcome in place, enforcing the status transition rules.
    pub fn apply_outcome(&mut self, outcome: EventOutcome) -> crate::Result<()> {
        let next = outcome.status();
        if !self.status.can_transition_to(next) {
            return Err(EventLogError::InvalidTransition {
                event_id: self.event_id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.error = match outcome {
            EventOutcome::Completed => None,
            EventOutcome::Failed(reason) => Some(reason),
        };
        self.attempts += 1;
        self.updated_at = Utc::now();
        Ok(())
    }
}
