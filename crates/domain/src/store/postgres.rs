use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, ShippingStatus, StoreId,
    UserId,
};
use event_log::{OrderEvent, insert_event};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{
    ApplyOutcome, DeliveryKey, EventDraft, FulfillmentEffect, FulfillmentStore, NewOrder,
    OrderStore, ShippingTransition,
};
use crate::error::{DomainError, Result};
use crate::order::{
    ListOrders, Order, OrderItem, Payment, Product, Shipping, ShippingAddress, errors,
};

/// PostgreSQL-backed order and fulfillment store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            product_uuid: row.try_get("product_uuid")?,
            store_id: StoreId::new(row.try_get("store_id")?),
            name: row.try_get("product_name")?,
            price: Money::from_cents(row.try_get("price")?),
            stock: row.try_get::<i32, _>("stock")? as u32,
        })
    }

    /// Loads an order with its items, payment and shipping.
    async fn load_order(conn: &mut PgConnection, order_id: i64) -> Result<Option<Order>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, order_uuid, user_id, store_id, status, total_price, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query(
            r#"
            SELECT oi.order_item_uuid, oi.product_id, p.product_uuid, oi.quantity, oi.total_price
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|r| -> Result<OrderItem> {
            Ok(OrderItem {
                order_item_uuid: r.try_get("order_item_uuid")?,
                product_id: ProductId::new(r.try_get("product_id")?),
                product_uuid: r.try_get("product_uuid")?,
                quantity: r.try_get::<i32, _>("quantity")? as u32,
                total_price: Money::from_cents(r.try_get("total_price")?),
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let id = OrderId::new(order_id);

        let payment = sqlx::query(
            "SELECT payment_uuid, amount, method, status FROM payments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|r| -> Result<Payment> {
            Ok(Payment {
                payment_uuid: r.try_get("payment_uuid")?,
                order_id: id,
                amount: Money::from_cents(r.try_get("amount")?),
                method: r.try_get::<String, _>("method")?.parse::<PaymentMethod>()?,
                status: r.try_get::<String, _>("status")?.parse::<PaymentStatus>()?,
            })
        })
        .transpose()?;

        let shipping = sqlx::query(
            r#"
            SELECT shipping_uuid, address, city, province, postal_code, status
            FROM shippings
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|r| -> Result<Shipping> {
            Ok(Shipping {
                shipping_uuid: r.try_get("shipping_uuid")?,
                order_id: id,
                address: ShippingAddress {
                    address: r.try_get("address")?,
                    city: r.try_get("city")?,
                    province: r.try_get("province")?,
                    postal_code: r.try_get("postal_code")?,
                },
                status: r.try_get::<String, _>("status")?.parse::<ShippingStatus>()?,
            })
        })
        .transpose()?;

        Ok(Some(Order {
            id,
            order_uuid: row.try_get("order_uuid")?,
            user_id: UserId::new(row.try_get("user_id")?),
            store_id: StoreId::new(row.try_get("store_id")?),
            status: row.try_get::<String, _>("status")?.parse::<OrderStatus>()?,
            total_price: Money::from_cents(row.try_get("total_price")?),
            items,
            payment,
            shipping,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn find_order_id(&self, sql: &str, owner: i64, order_uuid: Uuid) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar(sql)
            .bind(order_uuid)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn load_by_owner(&self, sql: &str, owner: i64, order_uuid: Uuid) -> Result<Option<Order>> {
        match self.find_order_id(sql, owner, order_uuid).await? {
            Some(id) => {
                let mut conn = self.pool.acquire().await?;
                Self::load_order(&mut conn, id).await
            }
            None => Ok(None),
        }
    }

    /// Pages through orders whose `owner_column` equals `owner`, newest first.
    async fn load_page(
        &self,
        owner_column: &'static str,
        owner: i64,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        let status = query.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM orders \
             WHERE {owner_column} = $1 AND ($2::TEXT IS NULL OR status = $2)"
        ))
        .bind(owner)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM orders \
             WHERE {owner_column} = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(owner)
        .bind(status)
        .bind(i64::from(query.size))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = Self::load_order(&mut conn, id).await? {
                orders.push(order);
            }
        }
        Ok((orders, total.max(0) as u64))
    }

    /// Runs a conditional status update and explains a miss.
    async fn transition_order(
        conn: &mut PgConnection,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        on_conflict: fn(&Order) -> DomainError,
    ) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
        )
        .bind(order_id.as_i64())
        .bind(to.as_str())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated == 0 {
            return match Self::load_order(conn, order_id.as_i64()).await? {
                Some(current) => Err(on_conflict(&current)),
                None => Err(DomainError::not_found(format!("Order {order_id} not found"))),
            };
        }
        Ok(())
    }

    async fn finish(
        mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: OrderId,
        draft: EventDraft,
    ) -> Result<(Order, OrderEvent)> {
        let event = draft.into_event(order_id);
        insert_event(&mut tx, &event).await?;
        let order = Self::load_order(&mut tx, order_id.as_i64())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Order {order_id} not found")))?;
        tx.commit().await?;
        Ok((order, event))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn products_by_uuid(&self, uuids: &[Uuid]) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_uuid, store_id, product_name, price, stock
            FROM products
            WHERE product_uuid = ANY($1)
            "#,
        )
        .bind(uuids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn store_of_seller(&self, seller_id: UserId) -> Result<Option<StoreId>> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM stores WHERE user_id = $1 ORDER BY id LIMIT 1")
                .bind(seller_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(StoreId::new))
    }

    async fn order_for_buyer(&self, user_id: UserId, order_uuid: Uuid) -> Result<Option<Order>> {
        self.load_by_owner(
            "SELECT id FROM orders WHERE order_uuid = $1 AND user_id = $2",
            user_id.as_i64(),
            order_uuid,
        )
        .await
    }

    async fn order_for_store(
        &self,
        store_id: StoreId,
        order_uuid: Uuid,
    ) -> Result<Option<Order>> {
        self.load_by_owner(
            "SELECT id FROM orders WHERE order_uuid = $1 AND store_id = $2",
            store_id.as_i64(),
            order_uuid,
        )
        .await
    }

    async fn orders_for_buyer(
        &self,
        user_id: UserId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        self.load_page("user_id", user_id.as_i64(), query).await
    }

    async fn orders_for_store(
        &self,
        store_id: StoreId,
        query: ListOrders,
    ) -> Result<(Vec<Order>, u64)> {
        self.load_page("store_id", store_id.as_i64(), query).await
    }

    async fn place_order(&self, new: NewOrder) -> Result<(Order, OrderEvent)> {
        let mut tx = self.pool.begin().await?;

        for item in &new.items {
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id.as_i64())
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if reserved == 0 {
                return Err(errors::insufficient_stock(item.product_uuid));
            }
        }

        let row = sqlx::query(
            r#"
            INSERT INTO orders (order_uuid, user_id, store_id, status, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(new.order_uuid)
        .bind(new.user_id.as_i64())
        .bind(new.store_id.as_i64())
        .bind(OrderStatus::Pending.as_str())
        .bind(new.total_price.cents())
        .fetch_one(&mut *tx)
        .await?;

        let order_id = OrderId::new(row.try_get("id")?);
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        let mut items = Vec::with_capacity(new.items.len());
        for item in new.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_item_uuid, order_id, product_id, quantity, total_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_item_uuid)
            .bind(order_id.as_i64())
            .bind(item.product_id.as_i64())
            .bind(item.quantity as i32)
            .bind(item.total_price.cents())
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                order_item_uuid: item.order_item_uuid,
                product_id: item.product_id,
                product_uuid: item.product_uuid,
                quantity: item.quantity,
                total_price: item.total_price,
            });
        }

        let event = new.event.into_event(order_id);
        insert_event(&mut tx, &event).await?;
        tx.commit().await?;

        let order = Order {
            id: order_id,
            order_uuid: new.order_uuid,
            user_id: new.user_id,
            store_id: new.store_id,
            status: OrderStatus::Pending,
            total_price: new.total_price,
            items,
            payment: None,
            shipping: None,
            created_at,
            updated_at,
        };
        Ok((order, event))
    }

    async fn cancel_order(
        &self,
        order_id: OrderId,
        draft: EventDraft,
    ) -> Result<(Order, OrderEvent)> {
        let mut tx = self.pool.begin().await?;

        Self::transition_order(
            &mut tx,
            order_id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            errors::cannot_cancel,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE products p
            SET stock = p.stock + oi.quantity
            FROM order_items oi
            WHERE oi.order_id = $1 AND p.id = oi.product_id
            "#,
        )
        .bind(order_id.as_i64())
        .execute(&mut *tx)
        .await?;

        Self::finish(tx, order_id, draft).await
    }

    async fn checkout_order(
        &self,
        order_id: OrderId,
        draft: EventDraft,
    ) -> Result<(Order, OrderEvent)> {
        let mut tx = self.pool.begin().await?;

        Self::transition_order(
            &mut tx,
            order_id,
            OrderStatus::Pending,
            OrderStatus::Processed,
            errors::cannot_checkout,
        )
        .await?;

        Self::finish(tx, order_id, draft).await
    }

    async fn update_shipping(&self, tr: ShippingTransition) -> Result<(Order, OrderEvent)> {
        let mut tx = self.pool.begin().await?;

        let shipping_updated = sqlx::query(
            r#"
            UPDATE shippings SET status = $2, updated_at = NOW()
            WHERE order_id = $1 AND status = $3
            "#,
        )
        .bind(tr.order_id.as_i64())
        .bind(tr.shipping_to.as_str())
        .bind(tr.shipping_from.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if shipping_updated == 0 {
            return Err(errors::modified_concurrently(tr.order_id));
        }

        Self::transition_order(&mut tx, tr.order_id, tr.order_from, tr.order_to, |order| {
            errors::modified_concurrently(order.order_uuid)
        })
        .await?;

        Self::finish(tx, tr.order_id, tr.event).await
    }
}

#[async_trait]
impl FulfillmentStore for PostgresStore {
    async fn apply(
        &self,
        key: Option<&DeliveryKey>,
        effect: FulfillmentEffect,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = key {
            let inserted = sqlx::query(
                r#"
                INSERT INTO applied_messages (event_uuid, consumer)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(key.event_id.as_uuid())
            .bind(&key.consumer)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                return Ok(ApplyOutcome::Duplicate);
            }
        }

        // Creates are no-ops when the row already exists (unkeyed redelivery).
        let order_id = effect.order_id();
        let affected = match effect {
            FulfillmentEffect::CreatePayment(p) => sqlx::query(
                r#"
                INSERT INTO payments (payment_uuid, order_id, amount, method, status)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (order_id) DO NOTHING
                "#,
            )
            .bind(p.payment_uuid)
            .bind(p.order_id.as_i64())
            .bind(p.amount.cents())
            .bind(p.method.as_str())
            .bind(p.status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
            .max(1),
            FulfillmentEffect::CreateShipping(s) => sqlx::query(
                r#"
                INSERT INTO shippings
                    (shipping_uuid, order_id, address, city, province, postal_code, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (order_id) DO NOTHING
                "#,
            )
            .bind(s.shipping_uuid)
            .bind(s.order_id.as_i64())
            .bind(&s.address.address)
            .bind(&s.address.city)
            .bind(&s.address.province)
            .bind(&s.address.postal_code)
            .bind(s.status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
            .max(1),
            FulfillmentEffect::SetPaymentStatus { status, .. } => sqlx::query(
                "UPDATE payments SET status = $2, updated_at = NOW() WHERE order_id = $1",
            )
            .bind(order_id.as_i64())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            FulfillmentEffect::SetShippingStatus { status, .. } => sqlx::query(
                "UPDATE shippings SET status = $2, updated_at = NOW() WHERE order_id = $1",
            )
            .bind(order_id.as_i64())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            FulfillmentEffect::SetOrderStatus { status, .. } => sqlx::query(
                "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(order_id.as_i64())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        };

        if affected == 0 {
            return Err(DomainError::not_found(format!(
                "No row to update for order {order_id}"
            )));
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }
}
