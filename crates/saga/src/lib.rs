//! Asynchronous side of the order fulfillment saga.
//!
//! Order commands write an `OrderEvent` in the same transaction as the order
//! change. This crate takes it from there:
//! 1. `EventPublisher` fans an event out to its topics with bounded retry and
//!    marks it `completed` or `failed`
//! 2. `PublishWorkerPool` runs publish jobs in the background under a
//!    concurrency cap
//! 3. `RetrySweeper` periodically resubmits old `failed` events
//! 4. The consumer handlers apply each topic to payments, shippings and
//!    order status, at most once per event id

pub mod consumers;
pub mod error;
pub mod pool;
pub mod publisher;
pub mod retry;
pub mod sweeper;

pub use consumers::{
    OrderStatusHandler, PaymentHandler, ShippingHandler, all_handlers, spawn_consumers,
};
pub use error::{Result, SagaError};
pub use pool::{DEFAULT_CONCURRENCY, PublishWorkerPool};
pub use publisher::{EventPublisher, records_for};
pub use retry::RetryPolicy;
pub use sweeper::{RetrySweeper, SweeperConfig};
