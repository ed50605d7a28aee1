//! Bounded, supervised pool of publish jobs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use broker::MessagePublisher;
use domain::EventDispatcher;
use event_log::{EventId, EventLog, OrderEvent};
use tokio::sync::{Notify, Semaphore};
use tokio_util::task::TaskTracker;

use crate::publisher::EventPublisher;

/// Default number of publishes allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

struct PoolInner<L, P> {
    publisher: EventPublisher<L, P>,
    permits: Semaphore,
    tracker: TaskTracker,
    in_flight: Mutex<HashSet<EventId>>,
    idle: Notify,
}

impl<L, P> PoolInner<L, P> {
    fn in_flight(&self) -> MutexGuard<'_, HashSet<EventId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs publish jobs in the background with at most `concurrency` of them
/// publishing at once.
///
/// An event already queued or running is not submitted twice. Jobs are
/// tracked, so [`PublishWorkerPool::shutdown`] waits for them to finish.
pub struct PublishWorkerPool<L, P> {
    inner: Arc<PoolInner<L, P>>,
}

impl<L, P> Clone for PublishWorkerPool<L, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, P> PublishWorkerPool<L, P>
where
    L: EventLog + 'static,
    P: MessagePublisher + 'static,
{
    pub fn new(publisher: EventPublisher<L, P>, concurrency: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                publisher,
                permits: Semaphore::new(concurrency.max(1)),
                tracker: TaskTracker::new(),
                in_flight: Mutex::new(HashSet::new()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn publisher(&self) -> &EventPublisher<L, P> {
        &self.inner.publisher
    }

    /// Number of events queued or publishing.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Queues `event` for publishing. Returns `false` if the same event is
    /// already in flight or the pool is shutting down.
    pub fn submit(&self, event: OrderEvent) -> bool {
        if self.inner.tracker.is_closed() {
            tracing::warn!(event_id = %event.event_id, "Publish pool is closed, dropping event");
            return false;
        }
        if !self.inner.in_flight().insert(event.event_id) {
            tracing::debug!(event_id = %event.event_id, "Event already in flight");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            let event_id = event.event_id;
            if let Ok(_permit) = inner.permits.acquire().await {
                metrics::gauge!("publish_pool_in_flight").increment(1.0);
                if let Err(e) = inner.publisher.publish(&event).await {
                    tracing::error!(event_id = %event_id, error = %e, "Publish job failed");
                }
                metrics::gauge!("publish_pool_in_flight").decrement(1.0);
            }
            let now_idle = {
                let mut in_flight = inner.in_flight();
                in_flight.remove(&event_id);
                in_flight.is_empty()
            };
            if now_idle {
                inner.idle.notify_waiters();
            }
        });
        true
    }

    /// Waits until no event is queued or publishing.
    ///
    /// The pool stays open meanwhile. Events submitted during the wait are
    /// accepted and waited for as well.
    pub async fn drain(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.inner.in_flight().is_empty() {
                return;
            }
            idle.await;
        }
    }

    /// Stops accepting jobs and waits for the running ones.
    pub async fn shutdown(&self) {
        self.inner.tracker.close();
        tracing::info!(pending = self.inner.tracker.len(), "Draining publish pool");
        self.inner.tracker.wait().await;
        tracing::info!("Publish pool drained");
    }
}

impl<L, P> EventDispatcher for PublishWorkerPool<L, P>
where
    L: EventLog + 'static,
    P: MessagePublisher + 'static,
{
    fn dispatch(&self, event: OrderEvent) {
        self.submit(event);
    }
}
