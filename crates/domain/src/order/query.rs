//! Paged order listings.

use common::OrderStatus;
use serde::Serialize;

use super::Order;
use crate::error::{DomainError, Result};

/// Largest page a listing may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page selection and optional status filter for an order listing.
///
/// Pages are 1-based. Orders come newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOrders {
    pub page: u32,
    pub size: u32,
    pub status: Option<OrderStatus>,
}

impl Default for ListOrders {
    fn default() -> Self {
        Self {
            page: 1,
            size: 10,
            status: None,
        }
    }
}

impl ListOrders {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            status: None,
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(DomainError::validation("Page must be at least 1"));
        }
        if self.size == 0 || self.size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

/// One page of orders plus the number of orders matching the filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl OrderPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.size.max(1)))
    }
}
