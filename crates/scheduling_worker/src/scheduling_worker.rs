use std::sync::Arc;
use std::time::Duration;

use skytask_domain::{
    ExpansionService, MatchDispatchService, OrderRepository, RequestStatusService,
    ScheduleRequestRepository, ScheduledEventRepository,
};
use skytask_nats::{
    NatsClient, NatsConsumer, NatsOpportunityMatcher, NatsRequestStatusProducer, ORDERS_STREAM,
    ORDER_CREATED_FILTER, REQUESTS_STREAM, REQUEST_STATUS_FILTER,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::nats::{create_order_created_processor, create_request_status_processor};

pub struct SchedulingWorkerConfig {
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub nats_max_deliveries: i64,
    pub match_timeout_secs: u64,
}

/// Consumer-side half of the tasking pipeline: expands order-created
/// events into schedule requests and dispatches them to the matcher, and
/// applies match reports to the request state machine.
pub struct SchedulingWorker {
    order_created_consumer: NatsConsumer,
    request_status_consumer: NatsConsumer,
}

impl SchedulingWorker {
    pub async fn new(
        order_repository: Arc<dyn OrderRepository>,
        request_repository: Arc<dyn ScheduleRequestRepository>,
        event_repository: Arc<dyn ScheduledEventRepository>,
        nats_client: Arc<NatsClient>,
        config: SchedulingWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing scheduling worker module");

        // Order-created side: expansion plus match dispatch.
        let expansion_service = Arc::new(ExpansionService::new(
            order_repository,
            request_repository.clone(),
        ));
        let matcher = Arc::new(NatsOpportunityMatcher::new(
            nats_client.core_client(),
            Duration::from_secs(config.match_timeout_secs),
        ));
        let status_producer = Arc::new(NatsRequestStatusProducer::new(
            nats_client.create_publisher_client(),
        ));
        let dispatch_service = Arc::new(MatchDispatchService::new(matcher, status_producer));

        let order_processor =
            create_order_created_processor(expansion_service, dispatch_service);
        let order_created_consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            nats_client.create_publisher_client(),
            ORDERS_STREAM,
            "scheduling-worker-orders",
            ORDER_CREATED_FILTER,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            config.nats_max_deliveries,
            order_processor,
        )
        .await?;

        // Status side: the request state machine.
        let status_service = Arc::new(RequestStatusService::new(
            request_repository,
            event_repository,
        ));
        let status_processor = create_request_status_processor(status_service);
        let request_status_consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            nats_client.create_publisher_client(),
            REQUESTS_STREAM,
            "scheduling-worker-status",
            REQUEST_STATUS_FILTER,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            config.nats_max_deliveries,
            status_processor,
        )
        .await?;

        info!("Scheduling worker initialized");

        Ok(Self {
            order_created_consumer,
            request_status_consumer,
        })
    }

    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        vec![
            Box::new({
                let consumer = self.order_created_consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
            Box::new({
                let consumer = self.request_status_consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
        ]
    }
}
