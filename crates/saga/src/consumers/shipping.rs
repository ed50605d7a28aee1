use async_trait::async_trait;
use broker::{
    ConsumerOperation, HandleOutcome, InboundMessage, MessageHandler, ShippingMessage,
    StatusMessage,
};
use common::ShippingStatus;
use domain::{FulfillmentEffect, FulfillmentStore, Shipping, ShippingAddress};

use super::apply_guarded;

/// Records shippings and their cancellation.
pub struct ShippingHandler<F> {
    store: F,
    cancel: bool,
}

impl<F: FulfillmentStore> ShippingHandler<F> {
    pub fn create(store: F) -> Self {
        Self {
            store,
            cancel: false,
        }
    }

    pub fn cancel(store: F) -> Self {
        Self {
            store,
            cancel: true,
        }
    }

    fn effect(&self, message: &InboundMessage) -> broker::Result<FulfillmentEffect> {
        if self.cancel {
            let msg: StatusMessage<ShippingStatus> = message.decode()?;
            return Ok(FulfillmentEffect::SetShippingStatus {
                order_id: msg.order_id,
                status: ShippingStatus::Cancelled,
            });
        }

        let msg: ShippingMessage = message.decode()?;
        Ok(FulfillmentEffect::CreateShipping(Shipping {
            shipping_uuid: msg.shipping_uuid,
            order_id: msg.order_id,
            address: ShippingAddress {
                address: msg.address,
                city: msg.city,
                province: msg.province,
                postal_code: msg.postal_code,
            },
            status: msg.status,
        }))
    }
}

#[async_trait]
impl<F: FulfillmentStore> MessageHandler for ShippingHandler<F> {
    fn operation(&self) -> ConsumerOperation {
        if self.cancel {
            ConsumerOperation::ShippingCancel
        } else {
            ConsumerOperation::ShippingCreate
        }
    }

    async fn handle(&self, message: &InboundMessage) -> broker::Result<HandleOutcome> {
        let effect = self.effect(message)?;
        apply_guarded(&self.store, self.operation(), message, effect).await
    }
}
