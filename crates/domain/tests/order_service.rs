//! Integration tests for the order command handler.
//!
//! These run against the in-memory store and verify stock accounting, the
//! outbox event written with each command, and the precondition checks.

use std::sync::{Arc, Mutex};

use common::{
    Money, OrderStatus, PaymentMethod, PaymentStatus, SequentialIds, ShippingStatus, StoreId,
    UserId,
};
use domain::{
    CancelOrder, CheckoutOrder, CreateOrder, DomainError, EventDispatcher, FulfillmentEffect,
    FulfillmentStore, InMemoryStore, Order, OrderLine, OrderService, Payment, Product, Shipping,
    ShippingAddress, UpdateShippingStatus,
};
use event_log::{EventLogExt, EventPayload, EventStatus, EventType, OrderEvent};

const BUYER: UserId = UserId::new(1);
const SELLER: UserId = UserId::new(2);

#[derive(Default)]
struct RecordingDispatcher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingDispatcher {
    fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: OrderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Fixture {
    service: OrderService<InMemoryStore>,
    store: InMemoryStore,
    dispatcher: Arc<RecordingDispatcher>,
    store_id: StoreId,
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryStore::default();
        let store_id = store.add_store(SELLER).await;
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = OrderService::with_ids(
            store.clone(),
            dispatcher.clone(),
            Arc::new(SequentialIds::default()),
        );
        Self {
            service,
            store,
            dispatcher,
            store_id,
        }
    }

    async fn product(&self, name: &str, price: i64, stock: u32) -> Product {
        self.store
            .add_product(self.store_id, name, Money::from_cents(price), stock)
            .await
    }

    async fn stock_of(&self, product: &Product) -> u32 {
        self.store.product(product.id).await.unwrap().stock
    }

    async fn place(&self, lines: Vec<OrderLine>) -> Result<Order, DomainError> {
        self.service
            .create_order(CreateOrder::new(
                BUYER,
                lines,
                address(),
                PaymentMethod::Transfer,
            ))
            .await
    }

    /// Records payment and shipping the way the consumers would.
    async fn settle(&self, order: &Order, payment_status: PaymentStatus) {
        let payment = order.payment.clone().unwrap();
        let shipping = order.shipping.clone().unwrap();
        self.store
            .apply(None, FulfillmentEffect::CreatePayment(payment))
            .await
            .unwrap();
        self.store
            .apply(None, FulfillmentEffect::CreateShipping(shipping))
            .await
            .unwrap();
        self.store
            .apply(
                None,
                FulfillmentEffect::SetPaymentStatus {
                    order_id: order.id,
                    status: payment_status,
                },
            )
            .await
            .unwrap();
    }

    async fn ship(&self, order: &Order, status: ShippingStatus) -> Result<Order, DomainError> {
        self.service
            .update_shipping_status(UpdateShippingStatus::new(SELLER, order.order_uuid, status))
            .await
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        address: "Jl. Merdeka 10".into(),
        city: "Bandung".into(),
        province: "Jawa Barat".into(),
        postal_code: "40111".into(),
    }
}

mod create_order {
    use super::*;

    #[tokio::test]
    async fn totals_stock_and_event_for_two_lines() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 10_000, 5).await;
        let pen = fx.product("Pen", 5_000, 10).await;

        let order = fx
            .place(vec![
                OrderLine::new(book.product_uuid, 1),
                OrderLine::new(pen.product_uuid, 2),
            ])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, Money::from_cents(20_000));
        assert_eq!(order.item_count(), 2);
        assert_eq!(fx.stock_of(&book).await, 4);
        assert_eq!(fx.stock_of(&pen).await, 8);

        let payment = order.payment.as_ref().unwrap();
        assert_eq!(payment.amount, Money::from_cents(20_000));
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(order.shipping.as_ref().unwrap().status, ShippingStatus::Pending);

        let events = fx.store.event_log().all_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::OrderCreated);
        assert_eq!(events[0].status, EventStatus::Pending);
        assert_eq!(events[0].order_id, order.id);
        match &events[0].payload {
            EventPayload::OrderCreated { payment, shipping } => {
                assert_eq!(payment.amount, Money::from_cents(20_000));
                assert_eq!(payment.method, PaymentMethod::Transfer);
                assert_eq!(shipping.postal_code, "40111");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert_eq!(fx.dispatcher.events(), events);
    }

    #[tokio::test]
    async fn duplicate_lines_are_merged() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;

        let order = fx
            .place(vec![
                OrderLine::new(book.product_uuid, 1),
                OrderLine::new(book.product_uuid, 2),
            ])
            .await
            .unwrap();

        assert_eq!(order.item_count(), 1);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(fx.stock_of(&book).await, 2);
    }

    #[tokio::test]
    async fn overflowing_merged_quantity_is_rejected() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;

        let err = fx
            .place(vec![
                OrderLine::new(book.product_uuid, u32::MAX),
                OrderLine::new(book.product_uuid, 1),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation_error");
        assert_eq!(fx.stock_of(&book).await, 5);
        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.store.event_log().all_events().await.is_empty());
        assert!(fx.dispatcher.events().is_empty());
    }

    #[tokio::test]
    async fn products_from_two_stores_conflict() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let other_store = fx.store.add_store(UserId::new(99)).await;
        let mug = fx
            .store
            .add_product(other_store, "Mug", Money::from_cents(2_000), 5)
            .await;

        let err = fx
            .place(vec![
                OrderLine::new(book.product_uuid, 1),
                OrderLine::new(mug.product_uuid, 1),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(fx.stock_of(&book).await, 5);
        assert_eq!(fx.stock_of(&mug).await, 5);
        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.dispatcher.events().is_empty());
    }

    #[tokio::test]
    async fn insufficient_stock_names_the_product() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 1).await;

        let err = fx
            .place(vec![OrderLine::new(book.product_uuid, 2)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "conflict");
        assert!(err.to_string().contains(&book.product_uuid.to_string()));
        assert_eq!(fx.stock_of(&book).await, 1);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .place(vec![OrderLine::new(uuid::Uuid::from_u128(404), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_command_is_rejected_before_reading_state() {
        let fx = Fixture::new().await;
        let err = fx.place(vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn event_log_failure_leaves_nothing_behind() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        fx.store.event_log().set_fail_on_append(true);

        let err = fx
            .place(vec![OrderLine::new(book.product_uuid, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Internal(_)));
        assert_eq!(fx.stock_of(&book).await, 5);
        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.dispatcher.events().is_empty());
    }
}

mod cancel_and_checkout {
    use super::*;

    #[tokio::test]
    async fn cancel_restores_stock_and_records_event() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 3)])
            .await
            .unwrap();

        let cancelled = fx
            .service
            .cancel_order(CancelOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.stock_of(&book).await, 5);

        let events = fx.store.event_log().events_for_order(order.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), EventType::OrderCancelled);
        assert_eq!(fx.dispatcher.events().len(), 2);
    }

    #[tokio::test]
    async fn cancel_by_another_user_is_not_found() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 1)])
            .await
            .unwrap();

        let err = fx
            .service
            .cancel_order(CancelOrder::new(UserId::new(77), order.order_uuid))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn checkout_moves_to_processed_once() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 1)])
            .await
            .unwrap();

        let processed = fx
            .service
            .checkout_order(CheckoutOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap();
        assert_eq!(processed.status, OrderStatus::Processed);

        let last = fx.dispatcher.events().pop().unwrap();
        assert_eq!(
            last.payload,
            EventPayload::PaymentProcessed {
                payment: event_log::StatusSnapshot::new(PaymentStatus::Paid)
            }
        );

        let err = fx
            .service
            .checkout_order(CheckoutOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(fx.dispatcher.events().len(), 2);
    }

    #[tokio::test]
    async fn cancel_after_checkout_conflicts() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 2)])
            .await
            .unwrap();
        fx.service
            .checkout_order(CheckoutOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap();

        let err = fx
            .service
            .cancel_order(CancelOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "Conflict: Order with ID {} cannot be cancelled, current status is processed",
                order.order_uuid
            )
        );
        assert_eq!(fx.stock_of(&book).await, 3);
    }
}

mod shipping {
    use super::*;

    async fn checked_out(fx: &Fixture) -> Order {
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 1)])
            .await
            .unwrap();
        fx.service
            .checkout_order(CheckoutOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap();
        order
    }

    #[tokio::test]
    async fn ship_then_deliver() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Paid).await;

        let shipped = fx.ship(&order, ShippingStatus::Shipped).await.unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(
            shipped.shipping.as_ref().unwrap().status,
            ShippingStatus::Shipped
        );

        let delivered = fx.ship(&order, ShippingStatus::Delivered).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Completed);

        let types: Vec<EventType> = fx
            .dispatcher
            .events()
            .iter()
            .map(OrderEvent::event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                EventType::OrderCreated,
                EventType::PaymentProcessed,
                EventType::ShippingProcessed,
                EventType::OrderDelivered,
            ]
        );
    }

    #[tokio::test]
    async fn unpaid_order_cannot_ship() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Pending).await;

        let err = fx.ship(&order, ShippingStatus::Shipped).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: Cannot update shipping. Payment status is pending"
        );
    }

    #[tokio::test]
    async fn deliver_requires_shipped() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Paid).await;

        let err = fx.ship(&order, ShippingStatus::Delivered).await.unwrap_err();
        assert!(err.to_string().contains("Cannot deliver order"));
    }

    #[tokio::test]
    async fn same_status_twice_is_rejected() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Paid).await;
        fx.ship(&order, ShippingStatus::Shipped).await.unwrap();

        let err = fx.ship(&order, ShippingStatus::Shipped).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn delivered_order_is_final() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Paid).await;
        fx.ship(&order, ShippingStatus::Shipped).await.unwrap();
        fx.ship(&order, ShippingStatus::Delivered).await.unwrap();

        let err = fx.ship(&order, ShippingStatus::Shipped).await.unwrap_err();
        assert!(err.to_string().contains("already delivered"));
    }

    #[tokio::test]
    async fn other_seller_sees_not_found() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.store.add_store(UserId::new(50)).await;

        let err = fx
            .service
            .update_shipping_status(UpdateShippingStatus::new(
                UserId::new(50),
                order.order_uuid,
                ShippingStatus::Shipped,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancelled_is_not_a_shipping_request() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;

        let err = fx.ship(&order, ShippingStatus::Cancelled).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn cancel_after_ship_leaves_everything_unchanged() {
        let fx = Fixture::new().await;
        let order = checked_out(&fx).await;
        fx.settle(&order, PaymentStatus::Paid).await;
        fx.ship(&order, ShippingStatus::Shipped).await.unwrap();
        let before = fx.store.order(order.id).await.unwrap();
        let stock_before = fx.store.product(before.items[0].product_id).await.unwrap();

        let err = fx
            .service
            .cancel_order(CancelOrder::new(BUYER, order.order_uuid))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(fx.store.order(order.id).await.unwrap(), before);
        assert_eq!(
            fx.store.product(before.items[0].product_id).await.unwrap(),
            stock_before
        );
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn buyer_and_seller_see_the_live_order() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 5).await;
        let order = fx
            .place(vec![OrderLine::new(book.product_uuid, 1)])
            .await
            .unwrap();
        let payment = Payment::from_snapshot(
            order.id,
            &event_log::PaymentSnapshot {
                payment_uuid: order.payment.as_ref().unwrap().payment_uuid,
                amount: order.total_price,
                method: PaymentMethod::Transfer,
                status: PaymentStatus::Pending,
            },
        );
        fx.store
            .apply(None, FulfillmentEffect::CreatePayment(payment.clone()))
            .await
            .unwrap();

        let seen = fx
            .service
            .get_order_for_buyer(BUYER, order.order_uuid)
            .await
            .unwrap();
        assert_eq!(seen.payment, Some(payment));
        assert_eq!(seen.shipping, None::<Shipping>);

        let seller_view = fx
            .service
            .get_order_for_seller(SELLER, order.order_uuid)
            .await
            .unwrap();
        assert_eq!(seller_view.order_uuid, order.order_uuid);

        let err = fx
            .service
            .get_order_for_buyer(UserId::new(3), order.order_uuid)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}

mod listing {
    use super::*;
    use domain::ListOrders;

    async fn place_many(fx: &Fixture, product: &Product, n: usize) -> Vec<Order> {
        let mut orders = Vec::new();
        for _ in 0..n {
            orders.push(
                fx.place(vec![OrderLine::new(product.product_uuid, 1)])
                    .await
                    .unwrap(),
            );
        }
        orders
    }

    #[tokio::test]
    async fn buyer_pages_come_newest_first() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 10).await;
        let placed = place_many(&fx, &book, 5).await;

        let first = fx
            .service
            .list_orders_for_buyer(BUYER, ListOrders::new(1, 2))
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages(), 3);
        let uuids: Vec<_> = first.items.iter().map(|o| o.order_uuid).collect();
        assert_eq!(uuids, vec![placed[4].order_uuid, placed[3].order_uuid]);

        let last = fx
            .service
            .list_orders_for_buyer(BUYER, ListOrders::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].order_uuid, placed[0].order_uuid);

        let past_the_end = fx
            .service
            .list_orders_for_buyer(BUYER, ListOrders::new(4, 2))
            .await
            .unwrap();
        assert!(past_the_end.items.is_empty());
        assert_eq!(past_the_end.total, 5);
    }

    #[tokio::test]
    async fn status_filter_narrows_items_and_total() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 10).await;
        let placed = place_many(&fx, &book, 3).await;
        fx.service
            .cancel_order(CancelOrder::new(BUYER, placed[1].order_uuid))
            .await
            .unwrap();

        let cancelled = fx
            .service
            .list_orders_for_buyer(BUYER, ListOrders::default().status(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(cancelled.total, 1);
        assert_eq!(cancelled.items[0].order_uuid, placed[1].order_uuid);
        assert_eq!(cancelled.items[0].status, OrderStatus::Cancelled);

        let pending = fx
            .service
            .list_orders_for_buyer(BUYER, ListOrders::default().status(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.total, 2);
    }

    #[tokio::test]
    async fn buyers_only_see_their_own_orders() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 10).await;
        place_many(&fx, &book, 2).await;

        let other = fx
            .service
            .list_orders_for_buyer(UserId::new(3), ListOrders::default())
            .await
            .unwrap();
        assert_eq!(other.total, 0);
        assert!(other.items.is_empty());
    }

    #[tokio::test]
    async fn seller_lists_orders_of_their_store() {
        let fx = Fixture::new().await;
        let book = fx.product("Book", 1_000, 10).await;
        place_many(&fx, &book, 2).await;

        let rival = UserId::new(9);
        let rival_store = fx.store.add_store(rival).await;
        let lamp = fx
            .store
            .add_product(rival_store, "Lamp", Money::from_cents(2_000), 4)
            .await;
        fx.place(vec![OrderLine::new(lamp.product_uuid, 1)])
            .await
            .unwrap();

        let mine = fx
            .service
            .list_orders_for_seller(SELLER, ListOrders::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 2);
        assert!(mine.items.iter().all(|o| o.store_id == fx.store_id));

        let theirs = fx
            .service
            .list_orders_for_seller(rival, ListOrders::default())
            .await
            .unwrap();
        assert_eq!(theirs.total, 1);
        assert_eq!(theirs.items[0].store_id, rival_store);
    }

    #[tokio::test]
    async fn user_without_a_store_is_not_found() {
        let fx = Fixture::new().await;

        let err = fx
            .service
            .list_orders_for_seller(BUYER, ListOrders::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn out_of_range_page_is_a_validation_error() {
        let fx = Fixture::new().await;

        for query in [
            ListOrders::new(0, 10),
            ListOrders::new(1, 0),
            ListOrders::new(1, domain::MAX_PAGE_SIZE + 1),
        ] {
            let err = fx
                .service
                .list_orders_for_buyer(BUYER, query)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }
    }
}
