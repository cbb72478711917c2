use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use skytask_domain::{DomainError, DomainResult, Order, OrderCreatedProducer};

use crate::messages::OrderCreatedMessage;
use crate::subjects::order_created_subject;
use crate::traits::JetStreamPublisher;

/// Publishes order-created events to `order.<image_type>.created`.
pub struct NatsOrderCreatedProducer {
    publisher: Arc<dyn JetStreamPublisher>,
}

impl NatsOrderCreatedProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl OrderCreatedProducer for NatsOrderCreatedProducer {
    async fn publish_order_created(&self, order: &Order) -> DomainResult<()> {
        let message = OrderCreatedMessage::for_order(order);
        let subject = order_created_subject(order.image_type);

        let payload = serde_json::to_vec(&message)
            .map_err(|e| DomainError::DeliveryFailure(format!("encode order created: {e}")))?;

        debug!(
            subject = %subject,
            order_id = %order.order_id,
            message_id = %message.message_id,
            "publishing order created event"
        );

        self.publisher
            .publish(subject, payload.into())
            .await
            .map_err(|e| DomainError::DeliveryFailure(format!("publish order created: {e}")))?;

        Ok(())
    }
}
