use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;

use crate::{EventId, EventOutcome, EventQuery, EventStatus, OrderEvent, Result};

/// Core trait for event log implementations.
///
/// Appends done through this trait commit on their own. Order commands
/// write their event inside the order transaction instead, via
/// [`crate::insert_event`] or the in-memory store's equivalent.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends a new event. Fails with `DuplicateEvent` if the id is taken.
    async fn append(&self, event: OrderEvent) -> Result<()>;

    /// Loads a single event.
    async fn get(&self, event_id: EventId) -> Result<Option<OrderEvent>>;

    /// Retrieves events matching a query, oldest first.
    async fn query(&self, query: EventQuery) -> Result<Vec<OrderEvent>>;

    /// Records the outcome of one publish run and returns the updated row.
    ///
    /// Fails with `InvalidTransition` if the event is already `completed`.
    async fn record_outcome(&self, event_id: EventId, outcome: EventOutcome)
    -> Result<OrderEvent>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Failed events created at or before `cutoff`, oldest first.
    async fn failed_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<OrderEvent>> {
        let mut query = EventQuery::failed_before(cutoff);
        query.limit = limit;
        self.query(query).await
    }

    /// Events still waiting for their first publish run.
    async fn pending_events(&self) -> Result<Vec<OrderEvent>> {
        self.query(EventQuery::new().status(EventStatus::Pending))
            .await
    }

    /// Pending events created at or before `cutoff`. Nothing resubmits these;
    /// they are left behind when a process stops mid-publish.
    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<OrderEvent>> {
        self.query(
            EventQuery::new()
                .status(EventStatus::Pending)
                .created_before(cutoff),
        )
        .await
    }

    /// Every event ever written for an order.
    async fn events_for_order(&self, order_id: OrderId) -> Result<Vec<OrderEvent>> {
        self.query(EventQuery::for_order(order_id)).await
    }

    async fn mark_completed(&self, event_id: EventId) -> Result<OrderEvent> {
        self.record_outcome(event_id, EventOutcome::Completed).await
    }

    async fn mark_failed(&self, event_id: EventId, error: String) -> Result<OrderEvent> {
        self.record_outcome(event_id, EventOutcome::Failed(error))
            .await
    }
}

impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Applies offset and limit to an already ordered result set.
pub(crate) fn paginate(events: Vec<OrderEvent>, query: &EventQuery) -> Vec<OrderEvent> {
    let offset = query.offset.unwrap_or(0);
    let events = events.into_iter().skip(offset);
    match query.limit {
        Some(limit) => events.take(limit).collect(),
        None => events.collect(),
    }
}
