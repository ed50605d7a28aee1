//! Event Log Store for the order fulfillment saga.
//!
//! Every order command writes exactly one [`OrderEvent`] in the same
//! database transaction as the order mutation. The publisher later moves
//! the row to `completed` or `failed`, and the retry sweeper picks failed
//! rows back up.

pub mod error;
pub mod event;
pub mod memory;
pub mod payload;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{EventLogError, Result};
pub use event::{EventId, EventOutcome, EventStatus, EventType, OrderEvent};
pub use memory::InMemoryEventLog;
pub use payload::{
    EventPayload, PayloadColumns, PaymentSnapshot, SCHEMA_VERSION, ShippingSnapshot,
    StatusSnapshot,
};
pub use postgres::{PostgresEventLog, insert_event};
pub use query::EventQuery;
pub use store::{EventLog, EventLogExt};
