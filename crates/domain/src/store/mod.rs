//! Persistence seams for the order domain.
//!
//! Every write method here is one unit of work: the order mutation, the
//! stock delta and the outbox row commit together or not at all. Each
//! precondition the service already checked is checked again inside the
//! write with a conditional update, so two racing commands cannot both win.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use common::{
    Money, OrderId, OrderStatus, PaymentStatus, ProductId, ShippingStatus, StoreId, UserId,
};
use event_log::{EventId, EventPayload, OrderEvent};
use uuid::Uuid;

use crate::error::Result;
use crate::order::{ListOrders, Order, Payment, Product, Shipping};

/// An outbox row waiting for its order id.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub event_id: EventId,
    pub payload: EventPayload,
}

impl EventDraft {
    pub fn new(event_id: EventId, payload: EventPayload) -> Self {
        Self { event_id, payload }
    }

    pub fn into_event(self, order_id: OrderId) -> OrderEvent {
        OrderEvent::new(self.event_id, order_id, self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_item_uuid: Uuid,
    pub product_id: ProductId,
    pub product_uuid: Uuid,
    pub quantity: u32,
    pub total_price: Money,
}

/// Everything `place_order` writes.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_uuid: Uuid,
    pub user_id: UserId,
    pub store_id: StoreId,
    pub total_price: Money,
    pub items: Vec<NewOrderItem>,
    pub event: EventDraft,
}

/// A seller-driven shipping step and the order status that goes with it.
#[derive(Debug, Clone)]
pub struct ShippingTransition {
    pub order_id: OrderId,
    pub shipping_from: ShippingStatus,
    pub shipping_to: ShippingStatus,
    pub order_from: OrderStatus,
    pub order_to: OrderStatus,
    pub event: EventDraft,
}

/// Storage used by the order command handler.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Products matching any of the given UUIDs. Unknown UUIDs are simply absent.
    async fn products_by_uuid(&self, uuids: &[Uuid]) -> Result<Vec<Product>>;

    /// The store owned by a seller, if any.
    async fn store_of_seller(&self, seller_id: UserId) -> Result<Option<StoreId>>;

    /// An order as seen by its buyer. `None` if missing or owned by someone else.
    async fn order_for_buyer(&self, user_id: UserId, order_uuid: Uuid) -> Result<Option<Order>>;

    /// An order placed with a store. `None` if missing or placed elsewhere.
    async fn order_for_store(&self, store_id: StoreId, order_uuid: Uuid)
    -> Result<Option<Order>>;

    /// One page of a buyer's orders, newest first, and the matching total.
    async fn orders_for_buyer(
        &self,
        user_id: UserId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)>;

    /// One page of a store's orders, newest first, and the matching total.
    async fn orders_for_store(
        &self,
        store_id: StoreId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)>;

    /// Reserves stock, inserts the order with its items and its event.
    ///
    /// Fails with `Conflict` if any product no longer has enough stock.
    async fn place_order(&self, order: NewOrder) -> Result<(Order, OrderEvent)>;

    /// `pending` → `cancelled`, restoring stock for every item.
    async fn cancel_order(&self, order_id: OrderId, event: EventDraft)
    -> Result<(Order, OrderEvent)>;

    /// `pending` → `processed`.
    async fn checkout_order(
        &self,
        order_id: OrderId,
        event: EventDraft,
    ) -> Result<(Order, OrderEvent)>;

    /// Moves shipping and order status together.
    async fn update_shipping(&self, transition: ShippingTransition)
    -> Result<(Order, OrderEvent)>;
}

/// A side effect applied by a consumer handler.
#[derive(Debug, Clone, PartialEq)]
pub enum FulfillmentEffect {
    CreatePayment(Payment),
    SetPaymentStatus {
        order_id: OrderId,
        status: PaymentStatus,
    },
    CreateShipping(Shipping),
    SetShippingStatus {
        order_id: OrderId,
        status: ShippingStatus,
    },
    SetOrderStatus {
        order_id: OrderId,
        status: OrderStatus,
    },
}

impl FulfillmentEffect {
    pub fn order_id(&self) -> OrderId {
        match self {
            FulfillmentEffect::CreatePayment(p) => p.order_id,
            FulfillmentEffect::CreateShipping(s) => s.order_id,
            FulfillmentEffect::SetPaymentStatus { order_id, .. }
            | FulfillmentEffect::SetShippingStatus { order_id, .. }
            | FulfillmentEffect::SetOrderStatus { order_id, .. } => *order_id,
        }
    }
}

/// Identifies one delivery of one event to one consumer operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryKey {
    pub event_id: EventId,
    pub consumer: String,
}

impl DeliveryKey {
    pub fn new(event_id: EventId, consumer: impl Into<String>) -> Self {
        Self {
            event_id,
            consumer: consumer.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The key was seen before; nothing changed.
    Duplicate,
}

/// Storage used by the consumer handlers.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Applies an effect. With a key, the effect and the guard row are
    /// written atomically and a repeated key is reported as `Duplicate`.
    async fn apply(
        &self,
        key: Option<&DeliveryKey>,
        effect: FulfillmentEffect,
    ) -> Result<ApplyOutcome>;
}
