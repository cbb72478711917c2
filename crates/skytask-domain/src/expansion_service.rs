use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DomainError, DomainResult};
use crate::recurrence::expand_order;
use crate::repository::{OrderRepository, ScheduleRequestRepository};
use crate::types::{RequestInsert, ScheduleRequest};

/// Consumer-side service that turns an order-created event into the
/// order's schedule requests.
///
/// Delivery is at-least-once, so creation must be idempotent: the
/// repository inserts each draft keyed on `(order_id, visit_index)` and
/// hands back the existing row when the key is already present. A
/// redelivered event therefore re-derives the same set of requests
/// without creating duplicates.
pub struct ExpansionService {
    order_repository: Arc<dyn OrderRepository>,
    request_repository: Arc<dyn ScheduleRequestRepository>,
}

impl ExpansionService {
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        request_repository: Arc<dyn ScheduleRequestRepository>,
    ) -> Self {
        Self {
            order_repository,
            request_repository,
        }
    }

    /// Expand the order and persist its schedule requests, returning the
    /// full set (newly created and pre-existing rows alike).
    pub async fn process_order_created(
        &self,
        order_id: &str,
    ) -> DomainResult<Vec<ScheduleRequest>> {
        let order = self
            .order_repository
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::OrderNotFound(order_id.to_string()))?;

        let drafts = expand_order(&order)?;
        let expected = drafts.len();

        let mut requests = Vec::with_capacity(expected);
        let mut created = 0usize;
        for draft in drafts {
            let visit_index = draft.visit_index;
            match self.request_repository.create_request(draft).await? {
                RequestInsert::Created(request) => {
                    created += 1;
                    requests.push(request);
                }
                RequestInsert::AlreadyExists(request) => {
                    debug!(
                        order_id = %order_id,
                        visit_index,
                        request_id = %request.request_id,
                        "schedule request already exists, skipping create"
                    );
                    requests.push(request);
                }
            }
        }

        info!(
            order_id = %order_id,
            total = expected,
            created,
            "expanded order into schedule requests"
        );

        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryScheduleRequestStore;
    use crate::repository::MockOrderRepository;
    use crate::types::{
        FrequencyUnit, ImageType, Order, Recurrence, RequestStatus, RevisitFrequency,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn recurring_order() -> Order {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Order {
            order_id: "order-1".to_string(),
            latitude: 10.0,
            longitude: 20.0,
            priority: 1,
            image_type: ImageType::Medium,
            start_time: start,
            end_time: start + Duration::hours(1),
            delivery_deadline: start + Duration::hours(2),
            recurrence: Recurrence {
                repeat: true,
                revisit_count: 2,
                frequency: Some(RevisitFrequency {
                    amount: 1,
                    unit: FrequencyUnit::Days,
                }),
            },
            created_at: None,
        }
    }

    fn order_repo_returning(order: Order, times: usize) -> MockOrderRepository {
        let mut repo = MockOrderRepository::new();
        repo.expect_get_order()
            .withf(move |id: &str| id == "order-1")
            .times(times)
            .returning(move |_| Ok(Some(order.clone())));
        repo
    }

    #[tokio::test]
    async fn test_expansion_creates_all_requests_pending() {
        let store = Arc::new(InMemoryScheduleRequestStore::new());
        let service = ExpansionService::new(
            Arc::new(order_repo_returning(recurring_order(), 1)),
            store.clone(),
        );

        let requests = service.process_order_created("order-1").await.unwrap();

        assert_eq!(requests.len(), 3);
        assert!(requests
            .iter()
            .all(|r| r.status == RequestStatus::Pending && r.status_reason.is_none()));
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn test_redelivered_event_does_not_duplicate_requests() {
        let store = Arc::new(InMemoryScheduleRequestStore::new());
        let service = ExpansionService::new(
            Arc::new(order_repo_returning(recurring_order(), 2)),
            store.clone(),
        );

        let first = service.process_order_created("order-1").await.unwrap();
        let second = service.process_order_created("order-1").await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        // Count after two deliveries equals count after one.
        assert_eq!(store.count().await, 3);

        // The second delivery observed the rows the first created.
        let mut first_ids: Vec<_> = first.iter().map(|r| r.request_id.clone()).collect();
        let mut second_ids: Vec<_> = second.iter().map(|r| r.request_id.clone()).collect();
        first_ids.sort();
        second_ids.sort();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_unknown_order_fails_with_not_found() {
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_get_order()
            .times(1)
            .return_once(|_| Ok(None));

        let service = ExpansionService::new(
            Arc::new(order_repo),
            Arc::new(InMemoryScheduleRequestStore::new()),
        );

        let result = service.process_order_created("ghost").await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }
}
