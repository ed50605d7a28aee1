//! Consumer handlers, one per subscription, and their supervisor.

mod order_status;
mod payment;
mod shipping;

pub use order_status::OrderStatusHandler;
pub use payment::PaymentHandler;
pub use shipping::ShippingHandler;

use std::sync::Arc;

use broker::{
    BrokerError, ConsumerOperation, HandleOutcome, InboundMessage, KafkaSubscriber, MessageHandler,
};
use domain::{ApplyOutcome, DeliveryKey, DomainError, FulfillmentEffect, FulfillmentStore};
use event_log::EventId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One handler for each of the six consumer operations.
pub fn all_handlers<F>(store: F) -> Vec<Arc<dyn MessageHandler>>
where
    F: FulfillmentStore + Clone + 'static,
{
    vec![
        Arc::new(PaymentHandler::create(store.clone())),
        Arc::new(PaymentHandler::cancel(store.clone())),
        Arc::new(PaymentHandler::checkout(store.clone())),
        Arc::new(ShippingHandler::create(store.clone())),
        Arc::new(ShippingHandler::cancel(store.clone())),
        Arc::new(OrderStatusHandler::new(store)),
    ]
}

/// Starts one long-running subscription task per handler.
pub fn spawn_consumers(
    subscriber: Arc<KafkaSubscriber>,
    handlers: Vec<Arc<dyn MessageHandler>>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    handlers
        .into_iter()
        .map(|handler| {
            let subscriber = Arc::clone(&subscriber);
            let cancel = cancel.clone();
            tokio::spawn(async move { subscriber.run(handler, cancel).await })
        })
        .collect()
}

/// Applies `effect`, guarded by the message's event id when it has one.
async fn apply_guarded<F: FulfillmentStore>(
    store: &F,
    operation: ConsumerOperation,
    message: &InboundMessage,
    effect: FulfillmentEffect,
) -> broker::Result<HandleOutcome> {
    let key = message
        .event_id
        .map(|id| DeliveryKey::new(EventId::from_uuid(id), operation.as_str()));
    if key.is_none() {
        tracing::debug!(operation = %operation, "Message has no event id, applying unguarded");
    }

    let order_id = effect.order_id();
    match store.apply(key.as_ref(), effect).await {
        Ok(ApplyOutcome::Applied) => {
            tracing::info!(operation = %operation, order_id = %order_id, "Message applied");
            Ok(HandleOutcome::Applied)
        }
        Ok(ApplyOutcome::Duplicate) => {
            tracing::info!(
                operation = %operation,
                order_id = %order_id,
                "Duplicate delivery, already applied"
            );
            Ok(HandleOutcome::Duplicate)
        }
        Err(e) => Err(handler_error(e)),
    }
}

fn handler_error(e: DomainError) -> BrokerError {
    BrokerError::Handler(e.to_string())
}
