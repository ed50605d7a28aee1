//! Hand-off from the command handler to whatever publishes events.

use event_log::OrderEvent;

/// Receives committed events for asynchronous publishing.
///
/// `dispatch` must not block. The command has already committed when it is
/// called, so implementations report publish failures elsewhere.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: OrderEvent);
}

/// Drops every event. Useful where nothing downstream is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn dispatch(&self, event: OrderEvent) {
        tracing::debug!(event_id = %event.event_id, "Dropping event, no dispatcher configured");
    }
}
