use std::sync::Arc;

use async_nats::jetstream::Message;
use skytask_domain::{ApplyMatchInput, DomainError, RequestStatusService};
use skytask_nats::{BatchProcessor, ProcessingResult, RequestStatusMessage};
use tracing::{debug, error, warn};

/// Create a BatchProcessor for request-status events.
///
/// Transitions are absorbing on the terminal side: a duplicate report is
/// acked as a no-op and a report that conflicts with a committed terminal
/// state is logged and acked, since replaying it can never succeed. Only
/// transient failures are nak'd for redelivery.
pub fn create_request_status_processor(
    status_service: Arc<RequestStatusService>,
) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let status_service = Arc::clone(&status_service);

        let message_data: Vec<(usize, Vec<u8>, String)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec(), msg.subject.to_string()))
            .collect();

        Box::pin(async move {
            let mut ack = Vec::new();
            let mut nak = Vec::new();

            for (idx, payload, subject) in message_data {
                let message: RequestStatusMessage = match serde_json::from_slice(&payload) {
                    Ok(message) => message,
                    Err(e) => {
                        error!(
                            error = %e,
                            subject = %subject,
                            "failed to decode request-status message"
                        );
                        nak.push((idx, Some(format!("decode error: {e}"))));
                        continue;
                    }
                };

                let input = ApplyMatchInput {
                    request_id: message.request_id.clone(),
                    outcome: message.outcome.clone(),
                    reason: message.reason.clone(),
                };

                match status_service.apply_match(input).await {
                    Ok(_) => {
                        debug!(
                            request_id = %message.request_id,
                            "applied request status report"
                        );
                        ack.push(idx);
                    }
                    Err(DomainError::InvalidTransition {
                        request_id,
                        current,
                        attempted,
                    }) => {
                        // Conflicting report against a committed terminal
                        // state; the committed state wins and the message
                        // is dropped.
                        error!(
                            request_id = %request_id,
                            current = %current,
                            attempted = %attempted,
                            "discarding conflicting status report"
                        );
                        ack.push(idx);
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            request_id = %message.request_id,
                            "failed to apply status report"
                        );
                        nak.push((idx, Some(e.to_string())));
                    }
                }
            }

            Ok(ProcessingResult::new(ack, nak))
        })
    })
}
