//! Status vocabularies and the order state machine.
//!
//! Order state transitions:
//! ```text
//! Pending ──checkout──► Processed ──ship──► Shipped ──deliver──► Completed
//!    │
//!    └──cancel──► Cancelled
//! ```
//!
//! Payment and shipping statuses are tracked separately on their own rows.
//! "Paid" is a payment status, never an order status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status string that does not belong to the expected vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! status_strings {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the lowercase wire/storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, stock reserved, awaiting checkout.
    #[default]
    Pending,
    /// Checked out, payment requested.
    Processed,
    /// Handed over to the carrier.
    Shipped,
    /// Delivered (terminal).
    Completed,
    /// Cancelled by the buyer (terminal).
    Cancelled,
}

status_strings!(OrderStatus, "order", {
    Pending => "pending",
    Processed => "processed",
    Shipped => "shipped",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Only orders nobody has acted on yet can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_checkout(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if `next` is reachable from `self` in one step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processed, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
}

status_strings!(PaymentStatus, "payment", {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

status_strings!(ShippingStatus, "shipping", {
    Pending => "pending",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// How the buyer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

status_strings!(PaymentMethod, "payment method", {
    Cash => "cash",
    Transfer => "transfer",
});
