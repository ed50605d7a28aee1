//! Buyer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderStatus, PaymentMethod, PaymentStatus, ShippingStatus};
use domain::{
    CancelOrder, CheckoutOrder, CreateOrder, ListOrders, Order, OrderLine, OrderPage, OrderStore,
    ShippingAddress,
};
use event_log::EventLog;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::caller::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Query string of the order listings. Missing values fall back to the
/// first page of ten.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub status: Option<String>,
}

impl ListOrdersParams {
    pub fn into_query(self) -> Result<ListOrders, ApiError> {
        let defaults = ListOrders::default();
        let mut query = ListOrders::new(
            self.page.unwrap_or(defaults.page),
            self.size.unwrap_or(defaults.size),
        );
        if let Some(raw) = self.status.as_deref() {
            let status: OrderStatus = raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Unknown order status: {raw}")))?;
            query = query.status(status);
        }
        Ok(query)
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_uuid: Uuid,
    pub status: OrderStatus,
    pub total_price: Money,
    pub items: Vec<OrderItemResponse>,
    pub payment: Option<PaymentResponse>,
    pub shipping: Option<ShippingResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub order_item_uuid: Uuid,
    pub product_uuid: Uuid,
    pub quantity: u32,
    pub total_price: Money,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_uuid: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct ShippingResponse {
    pub shipping_uuid: Uuid,
    #[serde(flatten)]
    pub address: ShippingAddress,
    pub status: ShippingStatus,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub items: Vec<OrderResponse>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl From<OrderPage> for OrderListResponse {
    fn from(page: OrderPage) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            page: page.page,
            size: page.size,
            total: page.total,
            total_pages,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_uuid: order.order_uuid,
            status: order.status,
            total_price: order.total_price,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    order_item_uuid: item.order_item_uuid,
                    product_uuid: item.product_uuid,
                    quantity: item.quantity,
                    total_price: item.total_price,
                })
                .collect(),
            payment: order.payment.map(|p| PaymentResponse {
                payment_uuid: p.payment_uuid,
                amount: p.amount,
                method: p.method,
                status: p.status,
            }),
            shipping: order.shipping.map(|s| ShippingResponse {
                shipping_uuid: s.shipping_uuid,
                address: s.address,
                status: s.status,
            }),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order for the calling buyer.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(user_id): Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let cmd = CreateOrder::new(user_id, req.items, req.shipping_address, req.payment_method);
    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders?page=&size=&status=: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(user_id): Caller,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let page = state
        .orders
        .list_orders_for_buyer(user_id, params.into_query()?)
        .await?;
    Ok(Json(page.into()))
}

/// GET /orders/{uuid}
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let order_uuid = parse_uuid(&id)?;
    let order = state.orders.get_order_for_buyer(user_id, order_uuid).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{uuid}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let order_uuid = parse_uuid(&id)?;
    let order = state
        .orders
        .cancel_order(CancelOrder::new(user_id, order_uuid))
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/{uuid}/checkout
#[tracing::instrument(skip(state))]
pub async fn checkout<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    L: EventLog + 'static,
{
    let order_uuid = parse_uuid(&id)?;
    let order = state
        .orders
        .checkout_order(CheckoutOrder::new(user_id, order_uuid))
        .await?;
    Ok(Json(order.into()))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
