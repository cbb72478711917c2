use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::recurrence::validate_recurrence;
use crate::repository::{OrderCreatedProducer, OrderRepository, ScheduleRequestRepository};
use crate::types::{
    CreateOrderInput, ListOrderRequestsInput, ListOrdersInput, Order, ScheduleRequest,
};

/// Intake-side domain service backing the gateway operations: create an
/// order, read it back, list its derived schedule requests.
///
/// Creating an order persists it and publishes the order-created event;
/// expansion into schedule requests happens asynchronously on the
/// consumer side so that redelivery of the event stays idempotent.
pub struct OrderService {
    order_repository: Arc<dyn OrderRepository>,
    request_repository: Arc<dyn ScheduleRequestRepository>,
    producer: Arc<dyn OrderCreatedProducer>,
}

impl OrderService {
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        request_repository: Arc<dyn ScheduleRequestRepository>,
        producer: Arc<dyn OrderCreatedProducer>,
    ) -> Self {
        Self {
            order_repository,
            request_repository,
            producer,
        }
    }

    /// Validate and persist a new order, then announce it on the order
    /// topic. Validation failures surface synchronously to the caller
    /// before anything is written.
    pub async fn create_order(&self, input: CreateOrderInput) -> DomainResult<Order> {
        validate_recurrence(&input.recurrence)?;

        if input.start_time >= input.end_time {
            return Err(DomainError::InvalidOrder(format!(
                "image window start {} is not before end {}",
                input.start_time, input.end_time
            )));
        }
        if input.end_time > input.delivery_deadline {
            return Err(DomainError::InvalidOrder(format!(
                "image window end {} is after delivery deadline {}",
                input.end_time, input.delivery_deadline
            )));
        }
        if !(-90.0..=90.0).contains(&input.latitude)
            || !(-180.0..=180.0).contains(&input.longitude)
        {
            return Err(DomainError::InvalidOrder(format!(
                "target ({}, {}) is not a valid coordinate",
                input.latitude, input.longitude
            )));
        }

        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            latitude: input.latitude,
            longitude: input.longitude,
            priority: input.priority,
            image_type: input.image_type,
            start_time: input.start_time,
            end_time: input.end_time,
            delivery_deadline: input.delivery_deadline,
            recurrence: input.recurrence,
            created_at: None,
        };

        let order = self.order_repository.create_order(order).await?;

        debug!(
            order_id = %order.order_id,
            image_type = %order.image_type,
            "persisted image order"
        );

        self.producer.publish_order_created(&order).await?;

        info!(
            order_id = %order.order_id,
            image_type = %order.image_type,
            revisit_count = order.recurrence.revisit_count,
            "created image order"
        );

        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> DomainResult<Order> {
        self.order_repository
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::OrderNotFound(order_id.to_string()))
    }

    pub async fn list_orders(&self, input: ListOrdersInput) -> DomainResult<Vec<Order>> {
        self.order_repository.list_orders(input).await
    }

    /// List the schedule requests derived from one order. Fails with
    /// `OrderNotFound` for an unknown order id rather than returning an
    /// empty page.
    pub async fn list_order_requests(
        &self,
        input: ListOrderRequestsInput,
    ) -> DomainResult<Vec<ScheduleRequest>> {
        self.get_order(&input.order_id).await?;
        self.request_repository.list_order_requests(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        MockOrderCreatedProducer, MockOrderRepository, MockScheduleRequestRepository,
    };
    use crate::types::{FrequencyUnit, ImageType, Recurrence, RevisitFrequency};
    use chrono::{Duration, TimeZone, Utc};

    fn valid_input() -> CreateOrderInput {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        CreateOrderInput {
            latitude: 10.0,
            longitude: 20.0,
            priority: 1,
            image_type: ImageType::Spotlight,
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
        }
    }

    #[tokio::test]
    async fn test_create_order_persists_then_publishes() {
        let mut order_repo = MockOrderRepository::new();
        let request_repo = MockScheduleRequestRepository::new();
        let mut producer = MockOrderCreatedProducer::new();

        order_repo
            .expect_create_order()
            .withf(|order: &Order| {
                order.image_type == ImageType::Spotlight && !order.order_id.is_empty()
            })
            .times(1)
            .return_once(|order| Ok(order));

        producer
            .expect_publish_order_created()
            .withf(|order: &Order| order.recurrence.revisit_count == 2)
            .times(1)
            .return_once(|_| Ok(()));

        let service = OrderService::new(
            Arc::new(order_repo),
            Arc::new(request_repo),
            Arc::new(producer),
        );

        let order = service.create_order(valid_input()).await.unwrap();

        assert_eq!(order.image_type, ImageType::Spotlight);
        assert!(!order.order_id.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejects_missing_frequency_before_persisting() {
        // Repository mock has no expectations: any call would panic.
        let order_repo = MockOrderRepository::new();
        let request_repo = MockScheduleRequestRepository::new();
        let producer = MockOrderCreatedProducer::new();

        let service = OrderService::new(
            Arc::new(order_repo),
            Arc::new(request_repo),
            Arc::new(producer),
        );

        let mut input = valid_input();
        input.recurrence.frequency = None;

        let result = service.create_order(input).await;

        assert!(matches!(result, Err(DomainError::InvalidRecurrence(_))));
    }

    #[tokio::test]
    async fn test_create_order_rejects_excessive_revisit_count() {
        // Repository mock has no expectations: any call would panic.
        let service = OrderService::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockScheduleRequestRepository::new()),
            Arc::new(MockOrderCreatedProducer::new()),
        );

        let mut input = valid_input();
        input.recurrence.revisit_count = u32::MAX;

        assert!(matches!(
            service.create_order(input).await,
            Err(DomainError::InvalidRecurrence(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_rejects_inverted_window() {
        let service = OrderService::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockScheduleRequestRepository::new()),
            Arc::new(MockOrderCreatedProducer::new()),
        );

        let mut input = valid_input();
        input.end_time = input.start_time - Duration::minutes(1);

        assert!(matches!(
            service.create_order(input).await,
            Err(DomainError::InvalidOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_rejects_deadline_before_window_end() {
        let service = OrderService::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockScheduleRequestRepository::new()),
            Arc::new(MockOrderCreatedProducer::new()),
        );

        let mut input = valid_input();
        input.delivery_deadline = input.end_time - Duration::minutes(30);

        assert!(matches!(
            service.create_order(input).await,
            Err(DomainError::InvalidOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_get_order()
            .times(1)
            .return_once(|_| Ok(None));

        let service = OrderService::new(
            Arc::new(order_repo),
            Arc::new(MockScheduleRequestRepository::new()),
            Arc::new(MockOrderCreatedProducer::new()),
        );

        let result = service.get_order("missing").await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_order_requests_checks_order_exists() {
        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_get_order()
            .times(1)
            .return_once(|_| Ok(None));

        // Request repository must not be queried for an unknown order.
        let request_repo = MockScheduleRequestRepository::new();

        let service = OrderService::new(
            Arc::new(order_repo),
            Arc::new(request_repo),
            Arc::new(MockOrderCreatedProducer::new()),
        );

        let result = service
            .list_order_requests(ListOrderRequestsInput {
                order_id: "missing".to_string(),
                page: 1,
                per_page: 20,
                all: false,
                order_types: None,
            })
            .await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }
}
