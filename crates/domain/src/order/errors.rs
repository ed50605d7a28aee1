//! Precondition failures shared by the service and the stores.

use uuid::Uuid;

use super::Order;
use crate::error::DomainError;

pub fn order_not_found(order_uuid: Uuid) -> DomainError {
    DomainError::not_found(format!("Order with ID {order_uuid} not found"))
}

pub fn insufficient_stock(product_uuid: Uuid) -> DomainError {
    DomainError::conflict(format!("Product {product_uuid} has insufficient stock"))
}

pub fn cannot_cancel(order: &Order) -> DomainError {
    DomainError::conflict(format!(
        "Order with ID {} cannot be cancelled, current status is {}",
        order.order_uuid, order.status
    ))
}

pub fn cannot_checkout(order: &Order) -> DomainError {
    DomainError::conflict(format!(
        "Order with ID {} cannot be checked out, current status is {}",
        order.order_uuid, order.status
    ))
}

pub fn modified_concurrently(order: impl std::fmt::Display) -> DomainError {
    DomainError::conflict(format!(
        "Order {order} was modified concurrently, retry the request"
    ))
}
