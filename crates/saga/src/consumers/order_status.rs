use async_trait::async_trait;
use broker::{ConsumerOperation, HandleOutcome, InboundMessage, MessageHandler, StatusMessage};
use common::OrderStatus;
use domain::{FulfillmentEffect, FulfillmentStore};

use super::apply_guarded;

/// Applies order status changes from `change_order_topic`.
pub struct OrderStatusHandler<F> {
    store: F,
}

impl<F: FulfillmentStore> OrderStatusHandler<F> {
    pub fn new(store: F) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<F: FulfillmentStore> MessageHandler for OrderStatusHandler<F> {
    fn operation(&self) -> ConsumerOperation {
        ConsumerOperation::OrderStatus
    }

    async fn handle(&self, message: &InboundMessage) -> broker::Result<HandleOutcome> {
        let msg: StatusMessage<OrderStatus> = message.decode()?;
        let effect = FulfillmentEffect::SetOrderStatus {
            order_id: msg.order_id,
            status: msg.status,
        };
        apply_guarded(&self.store, self.operation(), message, effect).await
    }
}
