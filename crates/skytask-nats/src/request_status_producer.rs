use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use skytask_domain::{DomainError, DomainResult, MatchReport, RequestStatusProducer};

use crate::messages::RequestStatusMessage;
use crate::subjects::request_status_subject;
use crate::traits::JetStreamPublisher;

/// Publishes match reports to `request.<id>.status`.
pub struct NatsRequestStatusProducer {
    publisher: Arc<dyn JetStreamPublisher>,
}

impl NatsRequestStatusProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl RequestStatusProducer for NatsRequestStatusProducer {
    async fn publish_status(&self, report: &MatchReport) -> DomainResult<()> {
        let message = RequestStatusMessage::for_report(report);
        let subject = request_status_subject(&report.request_id);

        let payload = serde_json::to_vec(&message)
            .map_err(|e| DomainError::DeliveryFailure(format!("encode status report: {e}")))?;

        debug!(
            subject = %subject,
            request_id = %report.request_id,
            message_id = %message.message_id,
            "publishing request status event"
        );

        self.publisher
            .publish(subject, payload.into())
            .await
            .map_err(|e| DomainError::DeliveryFailure(format!("publish status report: {e}")))?;

        Ok(())
    }
}
