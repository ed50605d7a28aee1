//! Shared handler state.

use domain::{OrderService, OrderStore};
use event_log::EventLog;

/// Everything the handlers need, built once at startup and shared behind an `Arc`.
pub struct AppState<S: OrderStore, L> {
    pub orders: OrderService<S>,
    pub events: L,
}

impl<S: OrderStore, L: EventLog> AppState<S, L> {
    pub fn new(orders: OrderService<S>, events: L) -> Self {
        Self { orders, events }
    }
}
