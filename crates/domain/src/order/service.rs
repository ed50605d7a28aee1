//! The order command handler.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::{
    IdGenerator, Money, OrderStatus, PaymentStatus, RandomIds, ShippingStatus, StoreId, UserId,
};
use event_log::{
    EventId, EventPayload, OrderEvent, PaymentSnapshot, ShippingSnapshot, StatusSnapshot,
};
use uuid::Uuid;

use super::{
    CancelOrder, CheckoutOrder, CreateOrder, ListOrders, Order, OrderPage, Payment, Product,
    Shipping, UpdateShippingStatus, errors,
};
use crate::dispatch::EventDispatcher;
use crate::error::{DomainError, Result};
use crate::store::{EventDraft, NewOrder, NewOrderItem, OrderStore, ShippingTransition};

/// Validates order commands, applies them through an [`OrderStore`] and
/// hands the resulting events to an [`EventDispatcher`].
///
/// Every command commits its mutation and its event together; the dispatch
/// happens after the commit and never fails the command.
pub struct OrderService<S: OrderStore> {
    store: S,
    dispatcher: Arc<dyn EventDispatcher>,
    ids: Arc<dyn IdGenerator>,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a service generating random UUIDs.
    pub fn new(store: S, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        Self::with_ids(store, dispatcher, Arc::new(RandomIds))
    }

    pub fn with_ids(
        store: S,
        dispatcher: Arc<dyn EventDispatcher>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            ids,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order, reserving stock for every line.
    ///
    /// The returned order carries the payment and shipping that the
    /// consumers are about to record, not what is stored yet.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order> {
        cmd.validate()?;
        let lines = cmd.merged_lines()?;

        let uuids: Vec<Uuid> = lines.iter().map(|l| l.product_uuid).collect();
        let products: HashMap<Uuid, Product> = self
            .store
            .products_by_uuid(&uuids)
            .await?
            .into_iter()
            .map(|p| (p.product_uuid, p))
            .collect();

        if let Some(missing) = uuids.iter().find(|u| !products.contains_key(*u)) {
            return Err(DomainError::not_found(format!(
                "Product with ID {missing} not found"
            )));
        }
        let store_id = single_store(products.values())?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = &products[&line.product_uuid];
            if product.stock < line.quantity {
                return Err(errors::insufficient_stock(product.product_uuid));
            }
            items.push(NewOrderItem {
                order_item_uuid: self.ids.next_uuid(),
                product_id: product.id,
                product_uuid: product.product_uuid,
                quantity: line.quantity,
                total_price: product.price.multiply(line.quantity),
            });
        }
        let total_price: Money = items.iter().map(|i| i.total_price).sum();

        let payment = PaymentSnapshot {
            payment_uuid: self.ids.next_uuid(),
            amount: total_price,
            method: cmd.payment_method,
            status: PaymentStatus::Pending,
        };
        let address = cmd.shipping_address;
        let shipping = ShippingSnapshot {
            shipping_uuid: self.ids.next_uuid(),
            address: address.address,
            city: address.city,
            province: address.province,
            postal_code: address.postal_code,
            status: ShippingStatus::Pending,
        };

        let new_order = NewOrder {
            order_uuid: self.ids.next_uuid(),
            user_id: cmd.user_id,
            store_id,
            total_price,
            items,
            event: self.draft(EventPayload::OrderCreated {
                payment: payment.clone(),
                shipping: shipping.clone(),
            }),
        };

        let (mut order, event) = self.store.place_order(new_order).await?;
        order.payment = Some(Payment::from_snapshot(order.id, &payment));
        order.shipping = Some(Shipping::from_snapshot(order.id, &shipping));

        tracing::info!(
            order_uuid = %order.order_uuid,
            total_price = %order.total_price,
            items = order.item_count(),
            "Order created"
        );
        metrics::counter!("orders_created_total").increment(1);
        self.dispatch(event);
        Ok(order)
    }

    /// Cancels a pending order and gives its stock back.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<Order> {
        let order = self.buyer_order(cmd.user_id, cmd.order_uuid).await?;
        if !order.status.can_cancel() {
            return Err(errors::cannot_cancel(&order));
        }

        let draft = self.draft(EventPayload::OrderCancelled {
            payment: StatusSnapshot::new(PaymentStatus::Cancelled),
            shipping: StatusSnapshot::new(ShippingStatus::Cancelled),
        });
        let (order, event) = self.store.cancel_order(order.id, draft).await?;

        tracing::info!(order_uuid = %order.order_uuid, "Order cancelled");
        self.dispatch(event);
        Ok(order)
    }

    /// Moves a pending order to `processed` and requests payment.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_order(&self, cmd: CheckoutOrder) -> Result<Order> {
        let order = self.buyer_order(cmd.user_id, cmd.order_uuid).await?;
        if !order.status.can_checkout() {
            return Err(errors::cannot_checkout(&order));
        }

        let draft = self.draft(EventPayload::PaymentProcessed {
            payment: StatusSnapshot::new(PaymentStatus::Paid),
        });
        let (order, event) = self.store.checkout_order(order.id, draft).await?;

        tracing::info!(order_uuid = %order.order_uuid, "Order checked out");
        self.dispatch(event);
        Ok(order)
    }

    /// Marks an order shipped or delivered on behalf of the seller.
    #[tracing::instrument(skip(self))]
    pub async fn update_shipping_status(&self, cmd: UpdateShippingStatus) -> Result<Order> {
        cmd.validate()?;
        let store_id = self
            .store
            .store_of_seller(cmd.seller_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Store not found for seller"))?;
        let order = self
            .store
            .order_for_store(store_id, cmd.order_uuid)
            .await?
            .ok_or_else(|| errors::order_not_found(cmd.order_uuid))?;

        let shipping_from = check_shipping_step(&order, cmd.status)?;
        let (order_to, payload) = match cmd.status {
            ShippingStatus::Shipped => (
                OrderStatus::Shipped,
                EventPayload::ShippingProcessed {
                    order: StatusSnapshot::new(OrderStatus::Shipped),
                },
            ),
            _ => (
                OrderStatus::Completed,
                EventPayload::OrderDelivered {
                    order: StatusSnapshot::new(OrderStatus::Completed),
                },
            ),
        };
        if !order.status.can_transition_to(order_to) {
            return Err(DomainError::conflict(format!(
                "Cannot move order from {} to {order_to}",
                order.status
            )));
        }

        let transition = ShippingTransition {
            order_id: order.id,
            shipping_from,
            shipping_to: cmd.status,
            order_from: order.status,
            order_to,
            event: self.draft(payload),
        };
        let (order, event) = self.store.update_shipping(transition).await?;

        tracing::info!(
            order_uuid = %order.order_uuid,
            status = %order.status,
            "Shipping status updated"
        );
        self.dispatch(event);
        Ok(order)
    }

    /// The live order as its buyer sees it.
    pub async fn get_order_for_buyer(&self, user_id: UserId, order_uuid: Uuid) -> Result<Order> {
        self.buyer_order(user_id, order_uuid).await
    }

    /// The live order as the seller of its store sees it.
    pub async fn get_order_for_seller(
        &self,
        seller_id: UserId,
        order_uuid: Uuid,
    ) -> Result<Order> {
        let store_id = self
            .store
            .store_of_seller(seller_id)
            .await?
            .ok_or_else(|| errors::order_not_found(order_uuid))?;
        self.store
            .order_for_store(store_id, order_uuid)
            .await?
            .ok_or_else(|| errors::order_not_found(order_uuid))
    }

    /// One page of the buyer's orders, newest first.
    pub async fn list_orders_for_buyer(
        &self,
        user_id: UserId,
        query: ListOrders,
    ) -> Result<OrderPage> {
        query.validate()?;
        let (items, total) = self.store.orders_for_buyer(user_id, query).await?;
        Ok(OrderPage {
            items,
            page: query.page,
            size: query.size,
            total,
        })
    }

    /// One page of the orders placed against the seller's store.
    pub async fn list_orders_for_seller(
        &self,
        seller_id: UserId,
        query: ListOrders,
    ) -> Result<OrderPage> {
        query.validate()?;
        let store_id = self
            .store
            .store_of_seller(seller_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Store not found for seller"))?;
        let (items, total) = self.store.orders_for_store(store_id, query).await?;
        Ok(OrderPage {
            items,
            page: query.page,
            size: query.size,
            total,
        })
    }

    async fn buyer_order(&self, user_id: UserId, order_uuid: Uuid) -> Result<Order> {
        self.store
            .order_for_buyer(user_id, order_uuid)
            .await?
            .ok_or_else(|| errors::order_not_found(order_uuid))
    }

    fn draft(&self, payload: EventPayload) -> EventDraft {
        EventDraft::new(EventId::from_uuid(self.ids.next_uuid()), payload)
    }

    fn dispatch(&self, event: OrderEvent) {
        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type(),
            "Dispatching event"
        );
        self.dispatcher.dispatch(event);
    }
}

/// The one store every product belongs to.
fn single_store<'a>(products: impl Iterator<Item = &'a Product>) -> Result<StoreId> {
    let stores: HashSet<StoreId> = products.map(|p| p.store_id).collect();
    let mut iter = stores.into_iter();
    match (iter.next(), iter.next()) {
        (Some(store_id), None) => Ok(store_id),
        (None, _) => Err(DomainError::not_found("Store not found for products")),
        (Some(_), Some(_)) => Err(DomainError::conflict(
            "Products must belong to the same store",
        )),
    }
}

/// Checks the shipping precondition chain and returns the current shipping status.
fn check_shipping_step(order: &Order, requested: ShippingStatus) -> Result<ShippingStatus> {
    let payment_status = order.payment.as_ref().map(|p| p.status);
    if payment_status != Some(PaymentStatus::Paid) {
        let shown = payment_status.map_or("missing".to_string(), |s| s.to_string());
        return Err(DomainError::conflict(format!(
            "Cannot update shipping. Payment status is {shown}"
        )));
    }

    let current = order
        .shipping
        .as_ref()
        .map(|s| s.status)
        .ok_or_else(|| DomainError::conflict("Cannot update shipping. Shipping is not recorded"))?;
    if current == ShippingStatus::Delivered {
        return Err(DomainError::conflict(
            "Cannot update shipping. Order is already delivered",
        ));
    }
    if current == requested {
        return Err(DomainError::conflict(format!(
            "Cannot update shipping. Current shipping status is {current}"
        )));
    }
    match (requested, current) {
        (ShippingStatus::Shipped, ShippingStatus::Pending)
        | (ShippingStatus::Delivered, ShippingStatus::Shipped) => Ok(current),
        (ShippingStatus::Shipped, _) => Err(DomainError::conflict(format!(
            "Cannot ship order. Current shipping status is {current}"
        ))),
        _ => Err(DomainError::conflict(format!(
            "Cannot deliver order. Current shipping status is {current}"
        ))),
    }
}
