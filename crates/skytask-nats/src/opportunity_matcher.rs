use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use skytask_domain::{
    DomainError, DomainResult, MatchOutcome, OpportunityMatcher, ScheduleRequest,
};

/// Subject the external matcher service answers request/reply on.
pub const MATCH_SUBJECT: &str = "opportunity.match";

/// Request body sent to the matcher service: just the facts it needs to
/// check its opportunity catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchQuery {
    pub request_id: String,
    pub order_id: String,
    pub order_type: String,
    pub window_start: chrono::DateTime<chrono::Utc>,
    pub window_end: chrono::DateTime<chrono::Utc>,
}

impl MatchQuery {
    pub fn for_request(request: &ScheduleRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            order_id: request.order_id.clone(),
            order_type: request.order_type.to_string(),
            window_start: request.window_start,
            window_end: request.window_end,
        }
    }
}

/// Opportunity matcher reached over core NATS request/reply.
///
/// The matching computation lives in an external service; from this side
/// it is a black box that answers a `MatchQuery` with a `MatchOutcome`.
/// Timeouts and transport errors are transient: the triggering message is
/// redelivered and the query retried.
pub struct NatsOpportunityMatcher {
    client: async_nats::Client,
    timeout: Duration,
}

impl NatsOpportunityMatcher {
    pub fn new(client: async_nats::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl OpportunityMatcher for NatsOpportunityMatcher {
    async fn find_opportunity(&self, request: &ScheduleRequest) -> DomainResult<MatchOutcome> {
        let query = MatchQuery::for_request(request);
        let payload = serde_json::to_vec(&query)
            .map_err(|e| DomainError::DeliveryFailure(format!("encode match query: {e}")))?;

        debug!(
            request_id = %request.request_id,
            subject = MATCH_SUBJECT,
            "querying opportunity matcher"
        );

        let response = tokio::time::timeout(
            self.timeout,
            self.client.request(MATCH_SUBJECT, payload.into()),
        )
        .await
        .map_err(|_| {
            DomainError::DeliveryFailure(format!(
                "opportunity matcher timed out after {:?}",
                self.timeout
            ))
        })?
        .map_err(|e| DomainError::DeliveryFailure(format!("opportunity matcher request: {e}")))?;

        let outcome: MatchOutcome = serde_json::from_slice(&response.payload)
            .map_err(|e| DomainError::DeliveryFailure(format!("decode match outcome: {e}")))?;

        debug!(
            request_id = %request.request_id,
            reason_code = %outcome.reason_code(),
            "received match outcome"
        );

        Ok(outcome)
    }
}
