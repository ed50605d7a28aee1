//! Topic names and the consumer operations subscribed to them.

use std::fmt;

/// The six topics the saga publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    CreatePayment,
    CancelPayment,
    CheckoutPayment,
    CreateShipping,
    CancelShipping,
    ChangeOrder,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::CreatePayment,
        Topic::CancelPayment,
        Topic::CheckoutPayment,
        Topic::CreateShipping,
        Topic::CancelShipping,
        Topic::ChangeOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CreatePayment => "create_payment_topic",
            Topic::CancelPayment => "cancel_payment_topic",
            Topic::CheckoutPayment => "checkout_payment_topic",
            Topic::CreateShipping => "create_shipping_topic",
            Topic::CancelShipping => "cancel_shipping_topic",
            Topic::ChangeOrder => "change_order_topic",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consumer subscription: an aggregate and what it does with a topic.
///
/// Each operation consumes exactly one topic under its own consumer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerOperation {
    PaymentCreate,
    PaymentCancel,
    PaymentCheckout,
    ShippingCreate,
    ShippingCancel,
    OrderStatus,
}

impl ConsumerOperation {
    pub const ALL: [ConsumerOperation; 6] = [
        ConsumerOperation::PaymentCreate,
        ConsumerOperation::PaymentCancel,
        ConsumerOperation::PaymentCheckout,
        ConsumerOperation::ShippingCreate,
        ConsumerOperation::ShippingCancel,
        ConsumerOperation::OrderStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerOperation::PaymentCreate => "payment-create",
            ConsumerOperation::PaymentCancel => "payment-cancel",
            ConsumerOperation::PaymentCheckout => "payment-checkout",
            ConsumerOperation::ShippingCreate => "shipping-create",
            ConsumerOperation::ShippingCancel => "shipping-cancel",
            ConsumerOperation::OrderStatus => "order-status",
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            ConsumerOperation::PaymentCreate => Topic::CreatePayment,
            ConsumerOperation::PaymentCancel => Topic::CancelPayment,
            ConsumerOperation::PaymentCheckout => Topic::CheckoutPayment,
            ConsumerOperation::ShippingCreate => Topic::CreateShipping,
            ConsumerOperation::ShippingCancel => Topic::CancelShipping,
            ConsumerOperation::OrderStatus => Topic::ChangeOrder,
        }
    }
}

impl fmt::Display for ConsumerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
