//! Order commands and their structural validation.

use std::collections::BTreeMap;

use common::{PaymentMethod, ShippingStatus, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ShippingAddress;
use crate::error::{DomainError, Result};

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_uuid: Uuid,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_uuid: Uuid, quantity: u32) -> Self {
        Self {
            product_uuid,
            quantity,
        }
    }
}

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The buyer placing the order.
    pub user_id: UserId,

    pub items: Vec<OrderLine>,

    pub shipping_address: ShippingAddress,

    pub payment_method: PaymentMethod,
}

impl CreateOrder {
    pub fn new(
        user_id: UserId,
        items: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id,
            items,
            shipping_address,
            payment_method,
        }
    }

    /// Checks the command shape before any state is read.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("Order must contain at least one item"));
        }
        if let Some(line) = self.items.iter().find(|l| l.quantity == 0) {
            return Err(DomainError::validation(format!(
                "Quantity for product {} must be at least 1",
                line.product_uuid
            )));
        }
        validate_address(&self.shipping_address)
    }

    /// Lines with duplicate products merged by summing quantities, in first-seen order.
    ///
    /// Fails with `Validation` if a merged quantity does not fit in a `u32`.
    pub fn merged_lines(&self) -> Result<Vec<OrderLine>> {
        let mut order: Vec<Uuid> = Vec::new();
        let mut totals: BTreeMap<Uuid, u32> = BTreeMap::new();
        for line in &self.items {
            let entry = totals.entry(line.product_uuid).or_insert_with(|| {
                order.push(line.product_uuid);
                0
            });
            *entry = entry.checked_add(line.quantity).ok_or_else(|| {
                DomainError::validation(format!(
                    "Quantity for product {} is too large",
                    line.product_uuid
                ))
            })?;
        }
        Ok(order
            .into_iter()
            .map(|uuid| OrderLine::new(uuid, totals[&uuid]))
            .collect())
    }
}

fn validate_address(address: &ShippingAddress) -> Result<()> {
    for (field, value) in [
        ("address", &address.address),
        ("city", &address.city),
        ("province", &address.province),
    ] {
        if value.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "Shipping {field} is required"
            )));
        }
    }
    let postal = &address.postal_code;
    if postal.len() != 5 || !postal.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(format!(
            "Postal code must be 5 digits, got {postal:?}"
        )));
    }
    Ok(())
}

/// Command to cancel an order on behalf of its buyer.
#[derive(Debug, Clone, Copy)]
pub struct CancelOrder {
    pub user_id: UserId,
    pub order_uuid: Uuid,
}

impl CancelOrder {
    pub fn new(user_id: UserId, order_uuid: Uuid) -> Self {
        Self {
            user_id,
            order_uuid,
        }
    }
}

/// Command to check out (request payment for) a pending order.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutOrder {
    pub user_id: UserId,
    pub order_uuid: Uuid,
}

impl CheckoutOrder {
    pub fn new(user_id: UserId, order_uuid: Uuid) -> Self {
        Self {
            user_id,
            order_uuid,
        }
    }
}

/// Command issued by the seller to mark an order shipped or delivered.
#[derive(Debug, Clone, Copy)]
pub struct UpdateShippingStatus {
    /// The seller's user id. Must own the store the order was placed with.
    pub seller_id: UserId,
    pub order_uuid: Uuid,
    pub status: ShippingStatus,
}

impl UpdateShippingStatus {
    pub fn new(seller_id: UserId, order_uuid: Uuid, status: ShippingStatus) -> Self {
        Self {
            seller_id,
            order_uuid,
            status,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.status {
            ShippingStatus::Shipped | ShippingStatus::Delivered => Ok(()),
            other => Err(DomainError::validation(format!("Invalid status: {other}"))),
        }
    }
}
