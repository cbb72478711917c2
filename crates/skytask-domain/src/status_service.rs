use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::repository::{ScheduleRequestRepository, ScheduledEventRepository};
use crate::types::{
    ApplyMatchInput, MatchOutcome, ScheduledEvent, Transition, TransitionOutcome,
    TransitionStatusInput,
};

/// Schedule request state machine: pending -> scheduled | rejected.
///
/// This service performs no matching itself; it records outcomes reported
/// by the opportunity matcher. Terminal states are absorbing: a duplicate
/// report carrying the same terminal status is a no-op, a report that
/// would flip a terminal status is an `InvalidTransition` and leaves the
/// committed state untouched. Linearizability per request id is delegated
/// to the repository's conditional update.
pub struct RequestStatusService {
    request_repository: Arc<dyn ScheduleRequestRepository>,
    event_repository: Arc<dyn ScheduledEventRepository>,
}

impl RequestStatusService {
    pub fn new(
        request_repository: Arc<dyn ScheduleRequestRepository>,
        event_repository: Arc<dyn ScheduledEventRepository>,
    ) -> Self {
        Self {
            request_repository,
            event_repository,
        }
    }

    pub async fn apply_match(&self, input: ApplyMatchInput) -> DomainResult<Transition> {
        let target = input.outcome.target_status();
        let reason_code = input.outcome.reason_code();
        let reason = input
            .reason
            .clone()
            .unwrap_or_else(|| input.outcome.default_reason());

        let outcome = self
            .request_repository
            .transition_status(TransitionStatusInput {
                request_id: input.request_id.clone(),
                new_status: target,
                status_reason: reason.clone(),
                reason_code,
            })
            .await?;

        match outcome {
            TransitionOutcome::Applied(request) => {
                info!(
                    request_id = %request.request_id,
                    order_id = %request.order_id,
                    status = %request.status,
                    reason_code = %reason_code,
                    "applied status transition"
                );
                if let MatchOutcome::Matched(opportunity) = &input.outcome {
                    self.record_scheduled_event(&request.request_id, &request.order_type, opportunity)
                        .await?;
                }
                Ok(Transition::Applied(request))
            }
            TransitionOutcome::NotPending(current) => {
                if current.status == target {
                    // Duplicate delivery with the same verdict.
                    debug!(
                        request_id = %current.request_id,
                        status = %current.status,
                        "transition already applied, ignoring duplicate"
                    );
                    if let MatchOutcome::Matched(opportunity) = &input.outcome {
                        // Re-record in case the first delivery failed between
                        // the transition and the event write; the store is
                        // idempotent on request id.
                        self.record_scheduled_event(
                            &current.request_id,
                            &current.order_type,
                            opportunity,
                        )
                        .await?;
                    }
                    Ok(Transition::AlreadyApplied(current))
                } else {
                    // Conflicting terminal verdicts signal a consistency bug
                    // upstream; surface it to operators instead of dropping.
                    error!(
                        request_id = %current.request_id,
                        current_status = %current.status,
                        attempted_status = %target,
                        "invalid status transition"
                    );
                    Err(DomainError::InvalidTransition {
                        request_id: current.request_id,
                        current: current.status,
                        attempted: target,
                    })
                }
            }
        }
    }

    async fn record_scheduled_event(
        &self,
        request_id: &str,
        order_type: &crate::types::ImageType,
        opportunity: &crate::types::OpportunityRef,
    ) -> DomainResult<()> {
        self.event_repository
            .record_event(ScheduledEvent {
                event_id: Uuid::new_v4().to_string(),
                request_id: request_id.to_string(),
                asset_name: opportunity.asset_name.clone(),
                ground_station: opportunity.ground_station.clone(),
                event_type: *order_type,
                created_at: None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryScheduleRequestStore, InMemoryScheduledEventStore};
    use crate::repository::ScheduleRequestRepository;
    use crate::types::{
        ImageType, OpportunityRef, RequestStatus, ScheduleRequestDraft,
    };
    use chrono::{Duration, TimeZone, Utc};

    async fn seed_pending_request(store: &InMemoryScheduleRequestStore) -> String {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let insert = store
            .create_request(ScheduleRequestDraft {
                request_id: "req-1".to_string(),
                order_id: "order-1".to_string(),
                order_type: ImageType::Spotlight,
                visit_index: 0,
                window_start: start,
                window_end: start + Duration::hours(1),
            })
            .await
            .unwrap();
        insert.into_request().request_id
    }

    fn matched(opportunity_id: &str) -> MatchOutcome {
        MatchOutcome::Matched(OpportunityRef {
            opportunity_id: opportunity_id.to_string(),
            asset_name: "SOSO-3".to_string(),
            ground_station: Some("GS-3".to_string()),
        })
    }

    fn service_over(
        requests: Arc<InMemoryScheduleRequestStore>,
        events: Arc<InMemoryScheduledEventStore>,
    ) -> RequestStatusService {
        RequestStatusService::new(requests, events)
    }

    #[tokio::test]
    async fn test_matched_outcome_schedules_with_verbatim_reason() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let request_id = seed_pending_request(&requests).await;
        let service = service_over(requests.clone(), events.clone());

        let transition = service
            .apply_match(ApplyMatchInput {
                request_id: request_id.clone(),
                outcome: matched("GS-3 pass #1102"),
                reason: Some("GS-3 pass #1102".to_string()),
            })
            .await
            .unwrap();

        let request = transition.request();
        assert_eq!(request.status, RequestStatus::Scheduled);
        assert_eq!(request.status_reason.as_deref(), Some("GS-3 pass #1102"));
        assert_eq!(request.reason_code, Some(crate::types::ReasonCode::Matched));

        let recorded = events.events().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].asset_name, "SOSO-3");
        assert_eq!(recorded[0].ground_station.as_deref(), Some("GS-3"));
    }

    #[tokio::test]
    async fn test_rejection_outcomes_carry_classified_reason_codes() {
        for (outcome, code) in [
            (MatchOutcome::NoOpportunity, crate::types::ReasonCode::NoOpportunity),
            (MatchOutcome::Conflict, crate::types::ReasonCode::Conflict),
            (MatchOutcome::Expired, crate::types::ReasonCode::Expired),
        ] {
            let requests = Arc::new(InMemoryScheduleRequestStore::new());
            let events = Arc::new(InMemoryScheduledEventStore::new());
            let request_id = seed_pending_request(&requests).await;
            let service = service_over(requests.clone(), events.clone());

            let transition = service
                .apply_match(ApplyMatchInput {
                    request_id,
                    outcome,
                    reason: None,
                })
                .await
                .unwrap();

            let request = transition.request();
            assert_eq!(request.status, RequestStatus::Rejected);
            assert_eq!(request.reason_code, Some(code));
            assert!(request.status_reason.as_deref().is_some_and(|r| !r.is_empty()));
            assert!(events.events().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_terminal_state_is_absorbing_on_conflicting_outcome() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let request_id = seed_pending_request(&requests).await;
        let service = service_over(requests.clone(), events.clone());

        service
            .apply_match(ApplyMatchInput {
                request_id: request_id.clone(),
                outcome: matched("GS-3 pass #1102"),
                reason: Some("GS-3 pass #1102".to_string()),
            })
            .await
            .unwrap();

        let result = service
            .apply_match(ApplyMatchInput {
                request_id: request_id.clone(),
                outcome: MatchOutcome::Conflict,
                reason: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                current: RequestStatus::Scheduled,
                attempted: RequestStatus::Rejected,
                ..
            })
        ));

        // Committed state is untouched.
        let request = requests.get_request(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Scheduled);
        assert_eq!(request.status_reason.as_deref(), Some("GS-3 pass #1102"));
    }

    #[tokio::test]
    async fn test_duplicate_same_outcome_is_noop() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let request_id = seed_pending_request(&requests).await;
        let service = service_over(requests.clone(), events.clone());

        let first = service
            .apply_match(ApplyMatchInput {
                request_id: request_id.clone(),
                outcome: matched("opp-1"),
                reason: None,
            })
            .await
            .unwrap();
        let second = service
            .apply_match(ApplyMatchInput {
                request_id: request_id.clone(),
                outcome: matched("opp-1"),
                reason: None,
            })
            .await
            .unwrap();

        assert!(matches!(first, Transition::Applied(_)));
        assert!(matches!(second, Transition::AlreadyApplied(_)));
        assert_eq!(events.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_same_outcome_leaves_one_consistent_state() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let request_id = seed_pending_request(&requests).await;
        let service = Arc::new(service_over(requests.clone(), events.clone()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = service.clone();
            let request_id = request_id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .apply_match(ApplyMatchInput {
                        request_id,
                        outcome: matched("opp-9"),
                        reason: None,
                    })
                    .await
            }));
        }

        let mut applied = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Transition::Applied(_) => applied += 1,
                Transition::AlreadyApplied(_) => already += 1,
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(already, 1);

        let request = requests.get_request(&request_id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_concurrent_conflicting_outcomes_raise_exactly_one_invalid_transition() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let request_id = seed_pending_request(&requests).await;
        let service = Arc::new(service_over(requests.clone(), events.clone()));

        let outcomes = vec![matched("opp-2"), MatchOutcome::NoOpportunity];
        let mut handles = Vec::new();
        for outcome in outcomes {
            let service = service.clone();
            let request_id = request_id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .apply_match(ApplyMatchInput {
                        request_id,
                        outcome,
                        reason: None,
                    })
                    .await
            }));
        }

        let mut applied = 0;
        let mut invalid = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Transition::Applied(_)) => applied += 1,
                Ok(Transition::AlreadyApplied(_)) => {
                    panic!("conflicting outcome cannot be a duplicate")
                }
                Err(DomainError::InvalidTransition { .. }) => invalid += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(invalid, 1);

        // One terminal state holds; it matches whichever report won.
        let request = requests.get_request(&request_id).await.unwrap().unwrap();
        assert!(request.status.is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_request_fails_with_not_found() {
        let requests = Arc::new(InMemoryScheduleRequestStore::new());
        let events = Arc::new(InMemoryScheduledEventStore::new());
        let service = service_over(requests, events);

        let result = service
            .apply_match(ApplyMatchInput {
                request_id: "ghost".to_string(),
                outcome: MatchOutcome::Expired,
                reason: None,
            })
            .await;

        assert!(matches!(result, Err(DomainError::RequestNotFound(_))));
    }
}
