//! Order domain for the marketplace fulfillment saga.
//!
//! This crate provides:
//! - Order, payment, shipping and product records
//! - Commands with structural validation
//! - The `OrderStore` and `FulfillmentStore` persistence seams, with
//!   in-memory and PostgreSQL implementations
//! - `OrderService`, the command handler that writes each mutation together
//!   with its outbox event and hands the event to an `EventDispatcher`

pub mod dispatch;
pub mod error;
pub mod order;
pub mod store;

pub use dispatch::{EventDispatcher, NoopDispatcher};
pub use error::{DomainError, Result};
pub use order::{
    CancelOrder, CheckoutOrder, CreateOrder, ListOrders, MAX_PAGE_SIZE, Order, OrderItem, OrderLine,
    OrderPage, OrderService, Payment, Product, Shipping, ShippingAddress, UpdateShippingStatus,
};
pub use store::{
    ApplyOutcome, DeliveryKey, EventDraft, FulfillmentEffect, FulfillmentStore, InMemoryStore,
    NewOrder, NewOrderItem, OrderStore, PostgresStore, ShippingTransition,
};
