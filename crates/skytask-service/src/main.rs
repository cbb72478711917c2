mod config;
mod runner;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use scheduling_worker::{SchedulingWorker, SchedulingWorkerConfig};
use skytask_nats::{NatsClient, DEADLETTER_STREAM, ORDERS_STREAM, REQUESTS_STREAM};
use skytask_postgres::{
    PostgresClient, PostgresOrderRepository, PostgresScheduleRequestRepository,
    PostgresScheduledEventRepository,
};
use tracing::{debug, error, info};

use config::ServiceConfig;
use runner::Runner;

const SCHEMA: &str = include_str!("../../skytask-postgres/migrations/001_init.sql");

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    telemetry::init_telemetry(&config.log_level);

    info!("Starting skytask service");
    debug!("Configuration: {:?}", config);

    let (postgres_client, nats_client) = match initialize_shared_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize shared dependencies: {e}");
            std::process::exit(1);
        }
    };

    let order_repository = Arc::new(PostgresOrderRepository::new(postgres_client.clone()));
    let request_repository = Arc::new(PostgresScheduleRequestRepository::new(
        postgres_client.clone(),
    ));
    let event_repository = Arc::new(PostgresScheduledEventRepository::new(postgres_client));

    let worker = match SchedulingWorker::new(
        order_repository,
        request_repository,
        event_repository,
        nats_client,
        SchedulingWorkerConfig {
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            nats_max_deliveries: config.nats_max_deliveries,
            match_timeout_secs: config.match_timeout_secs,
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize scheduling worker: {e}");
            std::process::exit(1);
        }
    };

    let mut runner = Runner::new().with_closer_timeout(Duration::from_secs(10));
    for (i, process) in worker.into_runner_processes().into_iter().enumerate() {
        runner = runner.with_named_process(format!("scheduling_worker_{i}"), process);
    }

    runner.run().await;
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(PostgresClient, Arc<NatsClient>)> {
    info!("Initializing PostgreSQL...");
    let postgres_client = PostgresClient::new(
        &config.postgres_host,
        config.postgres_port,
        &config.postgres_database,
        &config.postgres_username,
        &config.postgres_password,
        config.postgres_pool_size,
    )?;
    postgres_client.ping().await?;
    apply_schema(&postgres_client).await?;

    info!("Initializing NATS...");
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    for stream in [ORDERS_STREAM, REQUESTS_STREAM, DEADLETTER_STREAM] {
        nats_client.ensure_stream(stream).await?;
    }

    Ok((postgres_client, nats_client))
}

/// The schema is idempotent (`IF NOT EXISTS` throughout), so it is
/// applied unconditionally at startup.
async fn apply_schema(client: &PostgresClient) -> anyhow::Result<()> {
    let conn = client.get_connection().await?;
    conn.batch_execute(SCHEMA).await?;
    info!("Database schema applied");
    Ok(())
}
