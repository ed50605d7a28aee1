use chrono::{DateTime, Utc};
use common::OrderId;

use crate::{EventStatus, EventType, OrderEvent};

/// Builder for constructing event log queries.
///
/// Results are always ordered by creation time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by owning order.
    pub order_id: Option<OrderId>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<EventType>>,

    /// Filter by statuses (any of these).
    pub statuses: Option<Vec<EventStatus>>,

    /// Only events created at or before this instant.
    pub created_before: Option<DateTime<Utc>>,

    /// Only events created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific order.
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Failed events created at or before `cutoff`. This is what the retry sweeper scans.
    pub fn failed_before(cutoff: DateTime<Utc>) -> Self {
        Self {
            statuses: Some(vec![EventStatus::Failed]),
            created_before: Some(cutoff),
            ..Default::default()
        }
    }

    pub fn order_id(mut self, id: OrderId) -> Self {
        self.order_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_types = Some(vec![event_type]);
        self
    }

    pub fn event_types(mut self, event_types: Vec<EventType>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    pub fn created_before(mut self, ts: DateTime<Utc>) -> Self {
        self.created_before = Some(ts);
        self
    }

    pub fn created_after(mut self, ts: DateTime<Utc>) -> Self {
        self.created_after = Some(ts);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the event passes every filter (limit/offset excluded).
    pub fn matches(&self, event: &OrderEvent) -> bool {
        if let Some(id) = self.order_id
            && event.order_id != id
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type())
        {
            return false;
        }
        if let Some(ref statuses) = self.statuses
            && !statuses.contains(&event.status)
        {
            return false;
        }
        if let Some(before) = self.created_before
            && event.created_at > before
        {
            return false;
        }
        if let Some(after) = self.created_after
            && event.created_at < after
        {
            return false;
        }
        true
    }
}
