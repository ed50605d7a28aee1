//! Event log inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::OrderStore;
use event_log::{EventLog, EventQuery, EventStatus, OrderEvent};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

impl EventsParams {
    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

/// GET /events?status=&limit=. The limit is capped at 500 rows.
#[tracing::instrument(skip(state))]
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Query(params): Query<EventsParams>,
) -> Result<Json<Vec<OrderEvent>>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let mut query = EventQuery::new().limit(params.effective_limit());
    if let Some(raw) = params.status.as_deref() {
        let status: EventStatus = raw
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Unknown event status: {raw}")))?;
        query = query.status(status);
    }
    Ok(Json(state.events.query(query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<usize>) -> EventsParams {
        EventsParams {
            status: None,
            limit,
        }
    }

    #[test]
    fn test_limit_defaults_and_is_capped() {
        assert_eq!(params(None).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(params(Some(7)).effective_limit(), 7);
        assert_eq!(params(Some(usize::MAX)).effective_limit(), MAX_LIMIT);
    }
}
