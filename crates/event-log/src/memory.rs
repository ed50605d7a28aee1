use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::paginate;
use crate::{
    EventId, EventLog, EventLogError, EventOutcome, EventQuery, OrderEvent, Result,
};

/// In-memory event log for tests and local runs.
///
/// Provides the same interface as the PostgreSQL implementation, plus a
/// switch that makes appends fail so callers can exercise rollback paths.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<OrderEvent>>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns a copy of every stored event in insertion order.
    pub async fn all_events(&self) -> Vec<OrderEvent> {
        self.events.read().await.clone()
    }

    /// Configures the log to reject every subsequent append.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: OrderEvent) -> Result<()> {
        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(EventLogError::Unavailable);
        }

        let mut events = self.events.write().await;
        if events.iter().any(|e| e.event_id == event.event_id) {
            return Err(EventLogError::DuplicateEvent(event.event_id));
        }
        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type(),
            "order event appended"
        );
        events.push(event);
        Ok(())
    }

    async fn get(&self, event_id: EventId) -> Result<Option<OrderEvent>> {
        let events = self.events.read().await;
        Ok(events.iter().find(|e| e.event_id == event_id).cloned())
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<OrderEvent>> {
        let events = self.events.read().await;
        let mut matched: Vec<_> = events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.created_at);
        Ok(paginate(matched, &query))
    }

    async fn record_outcome(
        &self,
        event_id: EventId,
        outcome: EventOutcome,
    ) -> Result<OrderEvent> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.event_id == event_id)
            .ok_or(EventLogError::NotFound(event_id))?;

        event.apply_outcome(outcome)?;
        metrics::counter!("order_event_outcomes_total", "status" => event.status.as_str())
            .increment(1);
        Ok(event.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::{OrderId, OrderStatus, PaymentStatus, ShippingStatus};
    use uuid::Uuid;

    use super::*;
    use crate::{EventLogExt, EventPayload, EventStatus, EventType, StatusSnapshot};

    fn cancel_event(order_id: i64) -> OrderEvent {
        OrderEvent::new(
            EventId::from_uuid(Uuid::new_v4()),
            OrderId::new(order_id),
            EventPayload::OrderCancelled {
                payment: StatusSnapshot::new(PaymentStatus::Cancelled),
                shipping: StatusSnapshot::new(ShippingStatus::Cancelled),
            },
        )
    }

    fn status_event(order_id: i64) -> OrderEvent {
        OrderEvent::new(
            EventId::from_uuid(Uuid::new_v4()),
            OrderId::new(order_id),
            EventPayload::ShippingProcessed {
                order: StatusSnapshot::new(OrderStatus::Shipped),
            },
        )
    }

    #[tokio::test]
    async fn append_and_get() {
        let log = InMemoryEventLog::new();
        let event = cancel_event(1);
        let id = event.event_id;

        log.append(event).await.unwrap();

        let stored = log.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Pending);
        assert_eq!(stored.event_type(), EventType::OrderCancelled);
        assert_eq!(log.event_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_append_is_rejected() {
        let log = InMemoryEventLog::new();
        let event = cancel_event(1);

        log.append(event.clone()).await.unwrap();
        let result = log.append(event).await;

        assert!(matches!(result, Err(EventLogError::DuplicateEvent(_))));
        assert_eq!(log.event_count().await, 1);
    }

    #[tokio::test]
    async fn fail_on_append() {
        let log = InMemoryEventLog::new();
        log.set_fail_on_append(true);

        let result = log.append(cancel_event(1)).await;
        assert!(matches!(result, Err(EventLogError::Unavailable)));
        assert_eq!(log.event_count().await, 0);
    }

    #[tokio::test]
    async fn record_outcome_updates_row() {
        let log = InMemoryEventLog::new();
        let event = cancel_event(1);
        let id = event.event_id;
        log.append(event).await.unwrap();

        let failed = log
            .mark_failed(id, "Payment processing failed: timeout".into())
            .await
            .unwrap();
        assert_eq!(failed.status, EventStatus::Failed);
        assert_eq!(failed.attempts, 1);

        let completed = log.mark_completed(id).await.unwrap();
        assert_eq!(completed.status, EventStatus::Completed);
        assert!(completed.error.is_none());

        let again = log.mark_failed(id, "late".into()).await;
        assert!(matches!(again, Err(EventLogError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn record_outcome_unknown_event() {
        let log = InMemoryEventLog::new();
        let missing = EventId::from_uuid(Uuid::new_v4());

        let result = log.mark_completed(missing).await;
        assert!(matches!(result, Err(EventLogError::NotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn failed_before_selects_old_failures_only() {
        let log = InMemoryEventLog::new();
        let now = Utc::now();

        let old = cancel_event(1).created_at(now - Duration::hours(25));
        let recent = cancel_event(2).created_at(now - Duration::minutes(1));
        let old_pending = status_event(3).created_at(now - Duration::hours(30));
        let (old_id, recent_id) = (old.event_id, recent.event_id);

        log.append(old).await.unwrap();
        log.append(recent).await.unwrap();
        log.append(old_pending).await.unwrap();
        log.mark_failed(old_id, "boom".into()).await.unwrap();
        log.mark_failed(recent_id, "boom".into()).await.unwrap();

        let due = log
            .failed_before(now - Duration::hours(24), None)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event_id, old_id);
    }

    #[tokio::test]
    async fn pending_before_skips_recent_and_finished_rows() {
        let log = InMemoryEventLog::new();
        let now = Utc::now();

        let stuck = status_event(1).created_at(now - Duration::hours(30));
        let fresh = status_event(2).created_at(now - Duration::minutes(1));
        let done = status_event(3).created_at(now - Duration::hours(30));
        let (stuck_id, done_id) = (stuck.event_id, done.event_id);

        log.append(stuck).await.unwrap();
        log.append(fresh).await.unwrap();
        log.append(done).await.unwrap();
        log.mark_completed(done_id).await.unwrap();

        let stale = log.pending_before(now - Duration::hours(24)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].event_id, stuck_id);
    }

    #[tokio::test]
    async fn query_orders_oldest_first_with_limit() {
        let log = InMemoryEventLog::new();
        let now = Utc::now();

        for minutes in [5, 15, 10] {
            log.append(status_event(1).created_at(now - Duration::minutes(minutes)))
                .await
                .unwrap();
        }

        let events = log
            .query(EventQuery::for_order(OrderId::new(1)).limit(2))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].created_at < events[1].created_at);
        assert_eq!(events[0].created_at, now - Duration::minutes(15));

        let pending = log.pending_events().await.unwrap();
        assert_eq!(pending.len(), 3);
    }
}
