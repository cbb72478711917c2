use std::sync::Arc;

use async_nats::jetstream::Message;
use skytask_domain::{ExpansionService, MatchDispatchService};
use skytask_nats::{BatchProcessor, OrderCreatedMessage, ProcessingResult};
use tracing::{debug, error, warn};

/// Create a BatchProcessor for order-created events.
///
/// Each event is expanded into its schedule requests and every resulting
/// request is dispatched to the opportunity matcher. Expansion is
/// idempotent, so a nak'd message can be replayed without duplicating
/// requests; requests already resolved are skipped by the dispatcher.
pub fn create_order_created_processor(
    expansion_service: Arc<ExpansionService>,
    dispatch_service: Arc<MatchDispatchService>,
) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let expansion_service = Arc::clone(&expansion_service);
        let dispatch_service = Arc::clone(&dispatch_service);

        // Message borrows from the slice; copy out what the async block
        // needs before moving.
        let message_data: Vec<(usize, Vec<u8>, String)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec(), msg.subject.to_string()))
            .collect();

        Box::pin(async move {
            let mut ack = Vec::new();
            let mut nak = Vec::new();

            for (idx, payload, subject) in message_data {
                let message: OrderCreatedMessage = match serde_json::from_slice(&payload) {
                    Ok(message) => message,
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %subject,
                            "failed to decode order-created message"
                        );
                        nak.push((idx, Some(format!("decode error: {e}"))));
                        continue;
                    }
                };

                let requests = match expansion_service
                    .process_order_created(&message.order_id)
                    .await
                {
                    Ok(requests) => requests,
                    Err(e) => {
                        warn!(
                            error = %e,
                            order_id = %message.order_id,
                            "failed to expand order into schedule requests"
                        );
                        nak.push((idx, Some(e.to_string())));
                        continue;
                    }
                };

                let mut dispatch_failed = false;
                for request in &requests {
                    if let Err(e) = dispatch_service.dispatch(request).await {
                        warn!(
                            error = %e,
                            request_id = %request.request_id,
                            "failed to dispatch request to matcher"
                        );
                        dispatch_failed = true;
                    }
                }

                if dispatch_failed {
                    // Replay re-runs expansion (no-op) and retries the
                    // dispatches that did not go out.
                    nak.push((idx, Some("match dispatch incomplete".to_string())));
                } else {
                    debug!(
                        order_id = %message.order_id,
                        request_count = requests.len(),
                        "processed order-created event"
                    );
                    ack.push(idx);
                }
            }

            Ok(ProcessingResult::new(ack, nak))
        })
    })
}

// Note: the processor closure needs real jetstream::Message values, which
// cannot be constructed without a broker connection. The decode/expand/
// dispatch pipeline is unit-tested through the domain services and
// covered end to end by the integration tests.
