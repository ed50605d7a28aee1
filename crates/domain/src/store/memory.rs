use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, ProductId, StoreId, UserId};
use event_log::{EventLog, InMemoryEventLog, OrderEvent};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ApplyOutcome, DeliveryKey, EventDraft, FulfillmentEffect, FulfillmentStore, NewOrder,
    OrderStore, ShippingTransition,
};
use crate::error::{DomainError, Result};
use crate::order::{ListOrders, Order, OrderItem, Product, errors};

#[derive(Debug, Default)]
struct Tables {
    stores: HashMap<StoreId, UserId>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    applied: HashSet<DeliveryKey>,
    next_store_id: i64,
    next_product_id: i64,
    next_order_id: i64,
}

impl Tables {
    fn order_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::not_found(format!("Order {order_id} not found")))
    }
}

/// In-memory order and fulfillment store for tests.
///
/// A single lock guards all tables, and the event is appended while it is
/// held. An append failure leaves every table untouched.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    events: InMemoryEventLog,
}

impl InMemoryStore {
    /// Creates a store writing its events to `events`.
    pub fn new(events: InMemoryEventLog) -> Self {
        Self {
            tables: Arc::default(),
            events,
        }
    }

    /// Returns the event log this store appends to.
    pub fn event_log(&self) -> &InMemoryEventLog {
        &self.events
    }

    /// Registers a store owned by `seller_id`.
    pub async fn add_store(&self, seller_id: UserId) -> StoreId {
        let mut t = self.tables.lock().await;
        t.next_store_id += 1;
        let id = StoreId::new(t.next_store_id);
        t.stores.insert(id, seller_id);
        id
    }

    /// Adds a product to a store's catalog.
    pub async fn add_product(
        &self,
        store_id: StoreId,
        name: &str,
        price: Money,
        stock: u32,
    ) -> Product {
        let mut t = self.tables.lock().await;
        t.next_product_id += 1;
        let product = Product {
            id: ProductId::new(t.next_product_id),
            product_uuid: Uuid::new_v4(),
            store_id,
            name: name.to_string(),
            price,
            stock,
        };
        t.products.insert(product.id, product.clone());
        product
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.tables.lock().await.products.get(&id).cloned()
    }

    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.tables.lock().await.orders.get(&id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    async fn page(
        &self,
        owned: impl Fn(&Order) -> bool,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        let t = self.tables.lock().await;
        let matching: Vec<&Order> = t
            .orders
            .values()
            .rev()
            .filter(|o| owned(o) && query.status.is_none_or(|s| o.status == s))
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.size as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn append(&self, draft: EventDraft, order_id: OrderId) -> Result<OrderEvent> {
        let event = draft.into_event(order_id);
        self.events.append(event.clone()).await?;
        Ok(event)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn products_by_uuid(&self, uuids: &[Uuid]) -> Result<Vec<Product>> {
        let t = self.tables.lock().await;
        Ok(t.products
            .values()
            .filter(|p| uuids.contains(&p.product_uuid))
            .cloned()
            .collect())
    }

    async fn store_of_seller(&self, seller_id: UserId) -> Result<Option<StoreId>> {
        let t = self.tables.lock().await;
        Ok(t.stores
            .iter()
            .find(|(_, owner)| **owner == seller_id)
            .map(|(id, _)| *id))
    }

    async fn order_for_buyer(&self, user_id: UserId, order_uuid: Uuid) -> Result<Option<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders
            .values()
            .find(|o| o.order_uuid == order_uuid && o.user_id == user_id)
            .cloned())
    }

    async fn order_for_store(
        &self,
        store_id: StoreId,
        order_uuid: Uuid,
    ) -> Result<Option<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders
            .values()
            .find(|o| o.order_uuid == order_uuid && o.store_id == store_id)
            .cloned())
    }

    async fn orders_for_buyer(
        &self,
        user_id: UserId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        self.page(|o| o.user_id == user_id, query).await
    }

    async fn orders_for_store(
        &self,
        store_id: StoreId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        self.page(|o| o.store_id == store_id, query).await
    }

    async fn place_order(&self, new: NewOrder) -> Result<(Order, OrderEvent)> {
        let mut t = self.tables.lock().await;

        let mut needed: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in &new.items {
            *needed.entry(item.product_id).or_default() += item.quantity;
        }
        for (product_id, qty) in &needed {
            let product = t.products.get(product_id).ok_or_else(|| {
                DomainError::not_found(format!("Product {product_id} not found"))
            })?;
            if product.stock < *qty {
                return Err(errors::insufficient_stock(product.product_uuid));
            }
        }

        let order_id = OrderId::new(t.next_order_id + 1);
        let event = self.append(new.event, order_id).await?;

        t.next_order_id += 1;
        for (product_id, qty) in needed {
            if let Some(product) = t.products.get_mut(&product_id) {
                product.stock -= qty;
            }
        }
        let now = Utc::now();
        let order = Order {
            id: order_id,
            order_uuid: new.order_uuid,
            user_id: new.user_id,
            store_id: new.store_id,
            status: Default::default(),
            total_price: new.total_price,
            items: new
                .items
                .into_iter()
                .map(|i| OrderItem {
                    order_item_uuid: i.order_item_uuid,
                    product_id: i.product_id,
                    product_uuid: i.product_uuid,
                    quantity: i.quantity,
                    total_price: i.total_price,
                })
                .collect(),
            payment: None,
            shipping: None,
            created_at: now,
            updated_at: now,
        };
        t.orders.insert(order_id, order.clone());
        Ok((order, event))
    }

    async fn cancel_order(
        &self,
        order_id: OrderId,
        draft: EventDraft,
    ) -> Result<(Order, OrderEvent)> {
        let mut t = self.tables.lock().await;
        let order = t.order_mut(order_id)?;
        if !order.status.can_cancel() {
            return Err(errors::cannot_cancel(order));
        }

        let event = self.append(draft, order_id).await?;

        order.status = common::OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        let order = order.clone();
        for (product_id, qty) in order.restock_lines() {
            if let Some(product) = t.products.get_mut(&product_id) {
                product.stock += qty;
            }
        }
        Ok((order, event))
    }

    async fn checkout_order(
        &self,
        order_id: OrderId,
        draft: EventDraft,
    ) -> Result<(Order, OrderEvent)> {
        let mut t = self.tables.lock().await;
        let order = t.order_mut(order_id)?;
        if !order.status.can_checkout() {
            return Err(errors::cannot_checkout(order));
        }

        let event = self.append(draft, order_id).await?;

        order.status = common::OrderStatus::Processed;
        order.updated_at = Utc::now();
        Ok((order.clone(), event))
    }

    async fn update_shipping(&self, tr: ShippingTransition) -> Result<(Order, OrderEvent)> {
        let mut t = self.tables.lock().await;
        let order = t.order_mut(tr.order_id)?;
        let shipping_matches = order
            .shipping
            .as_ref()
            .is_some_and(|s| s.status == tr.shipping_from);
        if !shipping_matches || order.status != tr.order_from {
            return Err(errors::modified_concurrently(order.order_uuid));
        }

        let event = self.append(tr.event, tr.order_id).await?;

        if let Some(shipping) = order.shipping.as_mut() {
            shipping.status = tr.shipping_to;
        }
        order.status = tr.order_to;
        order.updated_at = Utc::now();
        Ok((order.clone(), event))
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    async fn apply(
        &self,
        key: Option<&DeliveryKey>,
        effect: FulfillmentEffect,
    ) -> Result<ApplyOutcome> {
        let mut t = self.tables.lock().await;
        if let Some(key) = key
            && t.applied.contains(key)
        {
            return Ok(ApplyOutcome::Duplicate);
        }

        let order = t.order_mut(effect.order_id())?;
        match effect {
            FulfillmentEffect::CreatePayment(payment) => {
                order.payment.get_or_insert(payment);
            }
            FulfillmentEffect::CreateShipping(shipping) => {
                order.shipping.get_or_insert(shipping);
            }
            FulfillmentEffect::SetPaymentStatus { order_id, status } => {
                let payment = order.payment.as_mut().ok_or_else(|| {
                    DomainError::not_found(format!("Payment for order {order_id} not found"))
                })?;
                payment.status = status;
            }
            FulfillmentEffect::SetShippingStatus { order_id, status } => {
                let shipping = order.shipping.as_mut().ok_or_else(|| {
                    DomainError::not_found(format!("Shipping for order {order_id} not found"))
                })?;
                shipping.status = status;
            }
            FulfillmentEffect::SetOrderStatus { status, .. } => {
                order.status = status;
            }
        }
        order.updated_at = Utc::now();

        if let Some(key) = key {
            t.applied.insert(key.clone());
        }
        Ok(ApplyOutcome::Applied)
    }
}
