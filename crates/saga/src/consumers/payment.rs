use async_trait::async_trait;
use broker::{
    ConsumerOperation, HandleOutcome, InboundMessage, MessageHandler, PaymentMessage,
    StatusMessage,
};
use common::PaymentStatus;
use domain::{FulfillmentEffect, FulfillmentStore, Payment};

use super::apply_guarded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Create,
    Cancel,
    Checkout,
}

/// Records payments and their status changes.
pub struct PaymentHandler<F> {
    store: F,
    step: Step,
}

impl<F: FulfillmentStore> PaymentHandler<F> {
    /// Inserts the payment described by a `create_payment_topic` message.
    pub fn create(store: F) -> Self {
        Self {
            store,
            step: Step::Create,
        }
    }

    /// Sets the payment `cancelled`.
    pub fn cancel(store: F) -> Self {
        Self {
            store,
            step: Step::Cancel,
        }
    }

    /// Sets the payment status carried by the message.
    pub fn checkout(store: F) -> Self {
        Self {
            store,
            step: Step::Checkout,
        }
    }

    fn effect(&self, message: &InboundMessage) -> broker::Result<FulfillmentEffect> {
        Ok(match self.step {
            Step::Create => {
                let msg: PaymentMessage = message.decode()?;
                FulfillmentEffect::CreatePayment(Payment {
                    payment_uuid: msg.payment_uuid,
                    order_id: msg.order_id,
                    amount: msg.amount,
                    method: msg.method,
                    status: msg.status,
                })
            }
            Step::Cancel => {
                let msg: StatusMessage<PaymentStatus> = message.decode()?;
                FulfillmentEffect::SetPaymentStatus {
                    order_id: msg.order_id,
                    status: PaymentStatus::Cancelled,
                }
            }
            Step::Checkout => {
                let msg: StatusMessage<PaymentStatus> = message.decode()?;
                FulfillmentEffect::SetPaymentStatus {
                    order_id: msg.order_id,
                    status: msg.status,
                }
            }
        })
    }
}

#[async_trait]
impl<F: FulfillmentStore> MessageHandler for PaymentHandler<F> {
    fn operation(&self) -> ConsumerOperation {
        match self.step {
            Step::Create => ConsumerOperation::PaymentCreate,
            Step::Cancel => ConsumerOperation::PaymentCancel,
            Step::Checkout => ConsumerOperation::PaymentCheckout,
        }
    }

    async fn handle(&self, message: &InboundMessage) -> broker::Result<HandleOutcome> {
        let effect = self.effect(message)?;
        apply_guarded(&self.store, self.operation(), message, effect).await
    }
}
