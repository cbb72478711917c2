use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DomainResult;
use crate::repository::{OpportunityMatcher, RequestStatusProducer};
use crate::types::{MatchReport, MatchOutcome, RequestStatus, ScheduleRequest};

/// Asks the opportunity matcher for a verdict on a pending request and
/// publishes the result on the request status topic.
///
/// The matcher is an external collaborator; a transport or computation
/// failure propagates as a transient error so the triggering message is
/// redelivered rather than the request silently staying unmatched.
pub struct MatchDispatchService {
    matcher: Arc<dyn OpportunityMatcher>,
    status_producer: Arc<dyn RequestStatusProducer>,
}

impl MatchDispatchService {
    pub fn new(
        matcher: Arc<dyn OpportunityMatcher>,
        status_producer: Arc<dyn RequestStatusProducer>,
    ) -> Self {
        Self {
            matcher,
            status_producer,
        }
    }

    /// Dispatch one request to the matcher. Requests already in a
    /// terminal state are skipped (duplicate delivery of the creation
    /// event after the request was resolved).
    pub async fn dispatch(&self, request: &ScheduleRequest) -> DomainResult<Option<MatchOutcome>> {
        if request.status != RequestStatus::Pending {
            debug!(
                request_id = %request.request_id,
                status = %request.status,
                "request already resolved, skipping match dispatch"
            );
            return Ok(None);
        }

        let outcome = self.matcher.find_opportunity(request).await?;

        self.status_producer
            .publish_status(&MatchReport {
                request_id: request.request_id.clone(),
                order_id: request.order_id.clone(),
                outcome: outcome.clone(),
                reason: None,
            })
            .await?;

        info!(
            request_id = %request.request_id,
            order_id = %request.order_id,
            reason_code = %outcome.reason_code(),
            "published match outcome"
        );

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::repository::{MockOpportunityMatcher, MockRequestStatusProducer};
    use crate::types::{ImageType, OpportunityRef, ReasonCode};
    use chrono::{Duration, TimeZone, Utc};

    fn pending_request() -> ScheduleRequest {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ScheduleRequest {
            request_id: "req-1".to_string(),
            order_id: "order-1".to_string(),
            order_type: ImageType::Low,
            visit_index: 0,
            window_start: start,
            window_end: start + Duration::hours(1),
            status: RequestStatus::Pending,
            status_reason: None,
            reason_code: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_publishes_matcher_outcome() {
        let mut matcher = MockOpportunityMatcher::new();
        let mut producer = MockRequestStatusProducer::new();

        matcher
            .expect_find_opportunity()
            .times(1)
            .return_once(|_| {
                Ok(MatchOutcome::Matched(OpportunityRef {
                    opportunity_id: "opp-1".to_string(),
                    asset_name: "SOSO-1".to_string(),
                    ground_station: None,
                }))
            });

        producer
            .expect_publish_status()
            .withf(|report: &MatchReport| {
                report.request_id == "req-1"
                    && report.outcome.reason_code() == ReasonCode::Matched
            })
            .times(1)
            .return_once(|_| Ok(()));

        let service = MatchDispatchService::new(Arc::new(matcher), Arc::new(producer));

        let outcome = service.dispatch(&pending_request()).await.unwrap();

        assert!(matches!(outcome, Some(MatchOutcome::Matched(_))));
    }

    #[tokio::test]
    async fn test_dispatch_skips_terminal_request() {
        // Neither collaborator may be touched for a resolved request.
        let matcher = MockOpportunityMatcher::new();
        let producer = MockRequestStatusProducer::new();
        let service = MatchDispatchService::new(Arc::new(matcher), Arc::new(producer));

        let mut request = pending_request();
        request.status = RequestStatus::Scheduled;

        let outcome = service.dispatch(&request).await.unwrap();

        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_matcher_failure_propagates() {
        let mut matcher = MockOpportunityMatcher::new();
        let producer = MockRequestStatusProducer::new();

        matcher
            .expect_find_opportunity()
            .times(1)
            .return_once(|_| Err(DomainError::DeliveryFailure("matcher unreachable".to_string())));

        let service = MatchDispatchService::new(Arc::new(matcher), Arc::new(producer));

        let result = service.dispatch(&pending_request()).await;

        assert!(matches!(result, Err(DomainError::DeliveryFailure(_))));
    }
}
