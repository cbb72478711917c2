//! In-memory stores implementing the repository traits. Used by unit and
//! worker tests and by local demos; production deployments use the
//! skytask-postgres implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{DomainError, DomainResult};
use crate::repository::{ScheduleRequestRepository, ScheduledEventRepository};
use crate::types::{
    ListOrderRequestsInput, RequestInsert, RequestStatus, ScheduleRequest, ScheduleRequestDraft,
    ScheduledEvent, TransitionOutcome, TransitionStatusInput,
};

/// In-memory ScheduleRequestRepository backed by a HashMap.
///
/// Mirrors the persistence contract: creation is idempotent on
/// `(order_id, visit_index)` and status transitions are applied under a
/// single write lock, so racing transitions are linearized exactly like
/// the conditional UPDATE in the Postgres implementation.
pub struct InMemoryScheduleRequestStore {
    requests: Arc<RwLock<HashMap<String, ScheduleRequest>>>,
}

impl InMemoryScheduleRequestStore {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.requests.read().await.len()
    }
}

impl Default for InMemoryScheduleRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleRequestRepository for InMemoryScheduleRequestStore {
    async fn create_request(&self, draft: ScheduleRequestDraft) -> DomainResult<RequestInsert> {
        let mut requests = self.requests.write().await;

        let existing = requests
            .values()
            .find(|r| r.order_id == draft.order_id && r.visit_index == draft.visit_index)
            .cloned();
        if let Some(existing) = existing {
            return Ok(RequestInsert::AlreadyExists(existing));
        }

        let now = Utc::now();
        let request = ScheduleRequest {
            request_id: draft.request_id.clone(),
            order_id: draft.order_id,
            order_type: draft.order_type,
            visit_index: draft.visit_index,
            window_start: draft.window_start,
            window_end: draft.window_end,
            status: RequestStatus::Pending,
            status_reason: None,
            reason_code: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        requests.insert(draft.request_id, request.clone());
        Ok(RequestInsert::Created(request))
    }

    async fn get_request(&self, request_id: &str) -> DomainResult<Option<ScheduleRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(request_id).cloned())
    }

    async fn list_order_requests(
        &self,
        input: ListOrderRequestsInput,
    ) -> DomainResult<Vec<ScheduleRequest>> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ScheduleRequest> = requests
            .values()
            .filter(|r| r.order_id == input.order_id)
            .filter(|r| match &input.order_types {
                Some(types) => types.contains(&r.order_type),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.visit_index);

        if !input.all {
            let page = input.page.max(1) as usize;
            let per_page = input.per_page as usize;
            matching = matching
                .into_iter()
                .skip((page - 1) * per_page)
                .take(per_page)
                .collect();
        }
        Ok(matching)
    }

    async fn transition_status(
        &self,
        input: TransitionStatusInput,
    ) -> DomainResult<TransitionOutcome> {
        let mut requests = self.requests.write().await;

        let request = requests
            .get_mut(&input.request_id)
            .ok_or_else(|| DomainError::RequestNotFound(input.request_id.clone()))?;

        if request.status != RequestStatus::Pending {
            return Ok(TransitionOutcome::NotPending(request.clone()));
        }

        request.status = input.new_status;
        request.status_reason = Some(input.status_reason);
        request.reason_code = Some(input.reason_code);
        request.updated_at = Some(Utc::now());
        Ok(TransitionOutcome::Applied(request.clone()))
    }
}

/// In-memory ScheduledEventRepository, idempotent on request id.
pub struct InMemoryScheduledEventStore {
    events: Arc<RwLock<HashMap<String, ScheduledEvent>>>,
}

impl InMemoryScheduledEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn events(&self) -> Vec<ScheduledEvent> {
        self.events.read().await.values().cloned().collect()
    }
}

impl Default for InMemoryScheduledEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduledEventRepository for InMemoryScheduledEventStore {
    async fn record_event(&self, event: ScheduledEvent) -> DomainResult<()> {
        let mut events = self.events.write().await;
        events.entry(event.request_id.clone()).or_insert(event);
        Ok(())
    }
}
