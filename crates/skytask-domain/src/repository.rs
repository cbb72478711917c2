use async_trait::async_trait;

use crate::error::DomainResult;
use crate::types::{
    ListOrderRequestsInput, ListOrdersInput, MatchOutcome, MatchReport, Order, RequestInsert,
    ScheduleRequest, ScheduleRequestDraft, ScheduledEvent, TransitionOutcome,
    TransitionStatusInput,
};

/// Storage for image orders. Orders are immutable; there is no update.
/// Infrastructure layer (skytask-postgres) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: Order) -> DomainResult<Order>;

    async fn get_order(&self, order_id: &str) -> DomainResult<Option<Order>>;

    async fn list_orders(&self, input: ListOrdersInput) -> DomainResult<Vec<Order>>;
}

/// Storage for schedule requests.
///
/// `create_request` must be idempotent on `(order_id, visit_index)`:
/// inserting an existing key returns the stored row unchanged.
/// `transition_status` must be a single conditional write so that racing
/// transitions for one request id are linearized by the store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScheduleRequestRepository: Send + Sync {
    async fn create_request(&self, draft: ScheduleRequestDraft) -> DomainResult<RequestInsert>;

    async fn get_request(&self, request_id: &str) -> DomainResult<Option<ScheduleRequest>>;

    async fn list_order_requests(
        &self,
        input: ListOrderRequestsInput,
    ) -> DomainResult<Vec<ScheduleRequest>>;

    async fn transition_status(
        &self,
        input: TransitionStatusInput,
    ) -> DomainResult<TransitionOutcome>;
}

/// Storage for booked capture/contact events.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScheduledEventRepository: Send + Sync {
    /// Record a booked event. Idempotent on `request_id`: recording the
    /// event for an already-scheduled request is a no-op.
    async fn record_event(&self, event: ScheduledEvent) -> DomainResult<()>;
}

/// Read-only rollups over current request state. Results are a
/// best-effort snapshot taken while writers may be active; acceptable for
/// operational dashboards, not for billing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn count_orders(&self) -> DomainResult<i64>;

    async fn count_requests(&self) -> DomainResult<i64>;

    /// Request counts grouped by order type, as `(order_type, count)`.
    async fn request_counts_by_type(&self) -> DomainResult<Vec<(String, i64)>>;

    /// Request counts grouped by status, optionally filtered to one order
    /// type, as `(status, count)`.
    async fn request_counts_by_status(
        &self,
        order_type: Option<String>,
    ) -> DomainResult<Vec<(String, i64)>>;

    /// Request counts grouped by status reason within one status, as
    /// `(reason, count)`; `None` reason groups unreasoned rows.
    async fn request_counts_by_reason(
        &self,
        order_type: Option<String>,
        status: String,
    ) -> DomainResult<Vec<(Option<String>, i64)>>;

    /// Scheduled event counts per satellite asset, as `(asset, count)`.
    async fn event_counts_by_asset(&self) -> DomainResult<Vec<(String, i64)>>;

    /// Event counts for one asset grouped by event type, as
    /// `(event_type, count)`.
    async fn event_counts_by_asset_and_type(
        &self,
        asset_name: String,
    ) -> DomainResult<Vec<(String, i64)>>;

    /// Scheduled contact counts per ground station, as `(station, count)`.
    async fn contact_counts_by_ground_station(&self) -> DomainResult<Vec<(String, i64)>>;
}

/// Publishes the order-created event to `order.<image_type>.created`.
/// Transport layer (skytask-nats) implements this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrderCreatedProducer: Send + Sync {
    async fn publish_order_created(&self, order: &Order) -> DomainResult<()>;
}

/// Publishes a match report to `request.<id>.status`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RequestStatusProducer: Send + Sync {
    async fn publish_status(&self, report: &MatchReport) -> DomainResult<()>;
}

/// External capability that binds a schedule request to a concrete
/// capture/contact opportunity. The geometry/orbital computation behind
/// it is a black box; this crate only consumes the outcome.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OpportunityMatcher: Send + Sync {
    async fn find_opportunity(&self, request: &ScheduleRequest) -> DomainResult<MatchOutcome>;
}
