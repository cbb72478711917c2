//! Domain core for satellite imaging tasking: orders, recurrence
//! expansion, the schedule request state machine, and the traits the
//! transport and storage layers implement.

pub mod dispatch_service;
pub mod error;
pub mod expansion_service;
pub mod in_memory;
pub mod order_service;
pub mod recurrence;
pub mod report_service;
pub mod repository;
pub mod status_service;
pub mod types;

pub use dispatch_service::MatchDispatchService;
pub use error::{DomainError, DomainResult};
pub use expansion_service::ExpansionService;
pub use in_memory::{InMemoryScheduleRequestStore, InMemoryScheduledEventStore};
pub use order_service::OrderService;
pub use recurrence::{expand_order, validate_recurrence, MAX_REVISIT_COUNT};
pub use report_service::ReportService;
pub use repository::{
    OpportunityMatcher, OrderCreatedProducer, OrderRepository, ReportRepository,
    RequestStatusProducer, ScheduleRequestRepository, ScheduledEventRepository,
};
pub use status_service::RequestStatusService;
pub use types::*;
