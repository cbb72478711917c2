mod client;
mod config;
mod models;
mod order_repository;
mod report_repository;
mod schedule_request_repository;
mod scheduled_event_repository;

pub use client::PostgresClient;
pub use config::PostgresConfig;
pub use models::{OrderRow, ScheduleRequestRow};
pub use order_repository::PostgresOrderRepository;
pub use report_repository::PostgresReportRepository;
pub use schedule_request_repository::PostgresScheduleRequestRepository;
pub use scheduled_event_repository::PostgresScheduledEventRepository;
