//! NATS JetStream transport: client wrapper, durable pull consumer with
//! bounded retries and dead-lettering, and producers for the order and
//! request status topics.

pub mod client;
pub mod consumer;
pub mod messages;
pub mod opportunity_matcher;
pub mod order_created_producer;
pub mod request_status_producer;
pub mod subjects;
pub mod traits;

pub use client::NatsClient;
pub use consumer::{BatchProcessor, NatsConsumer, ProcessingResult};
pub use messages::{OrderCreatedMessage, RequestStatusMessage};
pub use opportunity_matcher::{MatchQuery, NatsOpportunityMatcher, MATCH_SUBJECT};
pub use order_created_producer::NatsOrderCreatedProducer;
pub use request_status_producer::NatsRequestStatusProducer;
pub use subjects::{
    deadletter_subject, order_created_subject, request_status_subject, DEADLETTER_STREAM,
    ORDERS_STREAM, ORDER_CREATED_FILTER, REQUESTS_STREAM, REQUEST_STATUS_FILTER,
};
pub use traits::{JetStreamConsumer, JetStreamPublisher, PullConsumer};

#[cfg(any(test, feature = "testing"))]
pub use traits::{MockJetStreamConsumer, MockJetStreamPublisher, MockPullConsumer};
