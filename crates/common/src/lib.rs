//! Shared types for the order fulfillment workspace.
//!
//! Everything here is used on both sides of the broker: the command
//! handler that writes orders and the consumers that apply side effects.

pub mod ids;
pub mod money;
pub mod status;

pub use ids::{IdGenerator, OrderId, ProductId, RandomIds, SequentialIds, StoreId, UserId};
pub use money::Money;
pub use status::{OrderStatus, PaymentMethod, PaymentStatus, ShippingStatus, UnknownStatus};
