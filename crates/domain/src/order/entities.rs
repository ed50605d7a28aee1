//! Order, item, payment, shipping and product records.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, ShippingStatus, StoreId,
    UserId,
};
use event_log::{PaymentSnapshot, ShippingSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable product. Owned by a collaborating service; the order domain
/// only reads it and adjusts stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub product_uuid: Uuid,
    pub store_id: StoreId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

/// Delivery destination as entered by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

/// One line of an order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_uuid: Uuid,
    pub product_id: ProductId,
    pub product_uuid: Uuid,
    pub quantity: u32,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_uuid: Uuid,
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

impl Payment {
    /// Builds the payment a consumer would record from an order-created snapshot.
    pub fn from_snapshot(order_id: OrderId, snapshot: &PaymentSnapshot) -> Self {
        Self {
            payment_uuid: snapshot.payment_uuid,
            order_id,
            amount: snapshot.amount,
            method: snapshot.method,
            status: snapshot.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipping {
    pub shipping_uuid: Uuid,
    pub order_id: OrderId,
    pub address: ShippingAddress,
    pub status: ShippingStatus,
}

impl Shipping {
    pub fn from_snapshot(order_id: OrderId, snapshot: &ShippingSnapshot) -> Self {
        Self {
            shipping_uuid: snapshot.shipping_uuid,
            order_id,
            address: ShippingAddress {
                address: snapshot.address.clone(),
                city: snapshot.city.clone(),
                province: snapshot.province.clone(),
                postal_code: snapshot.postal_code.clone(),
            },
            status: snapshot.status,
        }
    }
}

/// An order with its items and, once the consumers have caught up, its
/// payment and shipping rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_uuid: Uuid,
    pub user_id: UserId,
    pub store_id: StoreId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
    pub shipping: Option<Shipping>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Stock to give back per product when the order is cancelled.
    pub fn restock_lines(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.items.iter().map(|i| (i.product_id, i.quantity))
    }
}
