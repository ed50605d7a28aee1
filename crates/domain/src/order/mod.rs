//! Orders and the command handler that mutates them.

mod commands;
mod entities;
pub mod errors;
mod query;
mod service;

pub use commands::{CancelOrder, CheckoutOrder, CreateOrder, OrderLine, UpdateShippingStatus};
pub use entities::{Order, OrderItem, Payment, Product, Shipping, ShippingAddress};
pub use query::{ListOrders, MAX_PAGE_SIZE, OrderPage};
pub use service::OrderService;
