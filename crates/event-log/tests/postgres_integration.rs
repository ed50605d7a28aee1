//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p event-log --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{OrderId, OrderStatus, PaymentStatus};
use event_log::{
    EventId, EventLog, EventLogError, EventLogExt, EventPayload, EventQuery, EventStatus,
    EventType, OrderEvent, PostgresEventLog, StatusSnapshot,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh log over cleared tables, plus one order row the events can point at.
async fn get_test_log() -> (PostgresEventLog, OrderId) {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE applied_messages, order_events, payments, shippings, order_items, \
         orders, products, stores RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store_id: i64 = sqlx::query_scalar(
        "INSERT INTO stores (store_uuid, user_id, name) VALUES ($1, 1, 'Toko') RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&pool)
    .await
    .unwrap();

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (order_uuid, user_id, store_id, status, total_price) \
         VALUES ($1, 2, $2, 'pending', 1000) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(store_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    (PostgresEventLog::new(pool), OrderId::new(order_id))
}

fn checkout_event(order_id: OrderId) -> OrderEvent {
    OrderEvent::new(
        EventId::from_uuid(Uuid::new_v4()),
        order_id,
        EventPayload::PaymentProcessed {
            payment: StatusSnapshot::new(PaymentStatus::Paid),
        },
    )
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn append_and_get_roundtrips_payload() {
    let (log, order_id) = get_test_log().await;
    let event = checkout_event(order_id);
    let id = event.event_id;

    log.append(event.clone()).await.unwrap();

    let stored = log.get(id).await.unwrap().unwrap();
    assert_eq!(stored.payload, event.payload);
    assert_eq!(stored.status, EventStatus::Pending);
    assert_eq!(stored.event_type(), EventType::PaymentProcessed);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn duplicate_event_uuid_is_rejected() {
    let (log, order_id) = get_test_log().await;
    let event = checkout_event(order_id);

    log.append(event.clone()).await.unwrap();
    let result = log.append(event).await;

    assert!(matches!(result, Err(EventLogError::DuplicateEvent(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn completed_events_are_terminal() {
    let (log, order_id) = get_test_log().await;
    let event = checkout_event(order_id);
    let id = event.event_id;
    log.append(event).await.unwrap();

    let failed = log.mark_failed(id, "broker down".into()).await.unwrap();
    assert_eq!(failed.status, EventStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("broker down"));
    assert_eq!(failed.attempts, 1);

    let completed = log.mark_completed(id).await.unwrap();
    assert_eq!(completed.status, EventStatus::Completed);
    assert!(completed.error.is_none());

    let result = log.mark_failed(id, "again".into()).await;
    assert!(matches!(
        result,
        Err(EventLogError::InvalidTransition {
            from: EventStatus::Completed,
            ..
        })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn failed_before_respects_cutoff() {
    let (log, order_id) = get_test_log().await;
    let now = Utc::now();

    let old = checkout_event(order_id).created_at(now - Duration::hours(25));
    let recent = checkout_event(order_id).created_at(now - Duration::minutes(1));
    let (old_id, recent_id) = (old.event_id, recent.event_id);
    log.append(old).await.unwrap();
    log.append(recent).await.unwrap();
    log.mark_failed(old_id, "x".into()).await.unwrap();
    log.mark_failed(recent_id, "x".into()).await.unwrap();

    let due = log
        .failed_before(now - Duration::hours(24), Some(10))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].event_id, old_id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn query_filters_by_type() {
    let (log, order_id) = get_test_log().await;

    log.append(checkout_event(order_id)).await.unwrap();
    log.append(OrderEvent::new(
        EventId::from_uuid(Uuid::new_v4()),
        order_id,
        EventPayload::ShippingProcessed {
            order: StatusSnapshot::new(OrderStatus::Shipped),
        },
    ))
    .await
    .unwrap();

    let shipped = log
        .query(EventQuery::for_order(order_id).event_type(EventType::ShippingProcessed))
        .await
        .unwrap();
    assert_eq!(shipped.len(), 1);

    let all = log.events_for_order(order_id).await.unwrap();
    assert_eq!(all.len(), 2);
}
