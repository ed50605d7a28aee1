use async_trait::async_trait;
use common::OrderId;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventId, EventLog, EventLogError, EventOutcome, EventPayload, EventQuery, EventStatus,
    EventType, OrderEvent, PayloadColumns, Result, SCHEMA_VERSION,
};

const SELECT_COLUMNS: &str = "SELECT event_uuid, order_id, event_type, status, schema_version, \
     payment_data, shipping_data, order_data, error, attempts, created_at, updated_at \
     FROM order_events";

/// Inserts an event as part of a caller-owned transaction.
///
/// Order commands call this so the event commits together with the order
/// mutation, or not at all.
pub async fn insert_event(tx: &mut Transaction<'_, Postgres>, event: &OrderEvent) -> Result<()> {
    let columns = event.payload.to_columns()?;

    sqlx::query(
        r#"
        INSERT INTO order_events
            (event_uuid, order_id, event_type, status, schema_version,
             payment_data, shipping_data, order_data, error, attempts, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(event.event_id.as_uuid())
    .bind(event.order_id.as_i64())
    .bind(event.event_type().as_str())
    .bind(event.status.as_str())
    .bind(SCHEMA_VERSION)
    .bind(columns.payment_data)
    .bind(columns.shipping_data)
    .bind(columns.order_data)
    .bind(event.error.as_deref())
    .bind(event.attempts)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("order_events_event_uuid_key")
        {
            return EventLogError::DuplicateEvent(event.event_id);
        }
        EventLogError::Database(e)
    })?;

    Ok(())
}

/// PostgreSQL-backed event log implementation.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<OrderEvent> {
        let event_type: EventType = row.try_get::<String, _>("event_type")?.parse()?;
        let status: EventStatus = row.try_get::<String, _>("status")?.parse()?;
        let columns = PayloadColumns {
            payment_data: row.try_get("payment_data")?,
            shipping_data: row.try_get("shipping_data")?,
            order_data: row.try_get("order_data")?,
        };
        let payload =
            EventPayload::from_columns(event_type, row.try_get("schema_version")?, columns)?;

        Ok(OrderEvent {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_uuid")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            status,
            payload,
            error: row.try_get("error")?,
            attempts: row.try_get("attempts")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, event: OrderEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, event_id: EventId) -> Result<Option<OrderEvent>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE event_uuid = $1"))
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<OrderEvent>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if query.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }
        if query.created_after.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.order_id {
            sqlx_query = sqlx_query.bind(id.as_i64());
        }
        if let Some(ref types) = query.event_types {
            let types: Vec<&str> = types.iter().map(EventType::as_str).collect();
            sqlx_query = sqlx_query.bind(types);
        }
        if let Some(ref statuses) = query.statuses {
            let statuses: Vec<&str> = statuses.iter().map(EventStatus::as_str).collect();
            sqlx_query = sqlx_query.bind(statuses);
        }
        if let Some(before) = query.created_before {
            sqlx_query = sqlx_query.bind(before);
        }
        if let Some(after) = query.created_after {
            sqlx_query = sqlx_query.bind(after);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn record_outcome(
        &self,
        event_id: EventId,
        outcome: EventOutcome,
    ) -> Result<OrderEvent> {
        let next = outcome.status();
        let error = match &outcome {
            EventOutcome::Completed => None,
            EventOutcome::Failed(reason) => Some(reason.as_str()),
        };

        // Conditional update: a completed row never changes again.
        let row = sqlx::query(
            r#"
            UPDATE order_events
            SET status = $2, error = $3, attempts = attempts + 1, updated_at = NOW()
            WHERE event_uuid = $1 AND status IN ('pending', 'failed')
            RETURNING event_uuid, order_id, event_type, status, schema_version,
                      payment_data, shipping_data, order_data, error, attempts,
                      created_at, updated_at
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(next.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                metrics::counter!("order_event_outcomes_total", "status" => next.as_str())
                    .increment(1);
                Self::row_to_event(row)
            }
            None => match self.get(event_id).await? {
                Some(current) => Err(EventLogError::InvalidTransition {
                    event_id,
                    from: current.status,
                    to: next,
                }),
                None => Err(EventLogError::NotFound(event_id)),
            },
        }
    }
}
