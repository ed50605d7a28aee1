//! Seller order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::ShippingStatus;
use domain::{OrderStore, UpdateShippingStatus};
use event_log::EventLog;
use serde::Deserialize;

use super::caller::Caller;
use super::orders::{ListOrdersParams, OrderListResponse, OrderResponse, parse_uuid};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateShippingRequest {
    pub status: ShippingStatus,
}

/// GET /seller/orders?page=&size=&status=: orders placed against the caller's store.
#[tracing::instrument(skip(state))]
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(seller_id): Caller,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let page = state
        .orders
        .list_orders_for_seller(seller_id, params.into_query()?)
        .await?;
    Ok(Json(page.into()))
}

/// GET /seller/orders/{uuid}
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(seller_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let order_uuid = parse_uuid(&id)?;
    let order = state.orders.get_order_for_seller(seller_id, order_uuid).await?;
    Ok(Json(order.into()))
}

/// PATCH /seller/orders/{uuid}/shipping: mark an order shipped or delivered.
#[tracing::instrument(skip(state, req))]
pub async fn update_shipping<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(seller_id): Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateShippingRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let order_uuid = parse_uuid(&id)?;
    let order = state
        .orders
        .update_shipping_status(UpdateShippingStatus::new(seller_id, order_uuid, req.status))
        .await?;
    Ok(Json(order.into()))
}
