//! HTTP surface and process wiring for marketplace order fulfillment.
//!
//! Exposes buyer and seller order endpoints over the order command handler,
//! an event log inspection endpoint, and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{InMemoryStore, OrderService, OrderStore};
use event_log::{EventLog, InMemoryEventLog};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S, L>).get(routes::orders::list::<S, L>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S, L>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, L>))
        .route("/orders/{id}/checkout", post(routes::orders::checkout::<S, L>))
        .route("/seller/orders", get(routes::seller::list::<S, L>))
        .route("/seller/orders/{id}", get(routes::seller::get::<S, L>))
        .route(
            "/seller/orders/{id}/shipping",
            patch(routes::seller::update_shipping::<S, L>),
        )
        .route("/events", get(routes::events::list::<S, L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// State over in-memory storage, publishing nowhere. Used by tests and local runs.
pub fn create_in_memory_state() -> (Arc<AppState<InMemoryStore, InMemoryEventLog>>, InMemoryStore)
{
    let log = InMemoryEventLog::new();
    let store = InMemoryStore::new(log.clone());
    let orders = OrderService::new(store.clone(), Arc::new(domain::NoopDispatcher));
    (Arc::new(AppState::new(orders, log)), store)
}
