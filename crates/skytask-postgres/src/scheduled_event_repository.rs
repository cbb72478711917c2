use async_trait::async_trait;
use chrono::Utc;
use skytask_domain::{DomainError, DomainResult, ScheduledEvent, ScheduledEventRepository};
use tracing::debug;

use crate::client::PostgresClient;

/// PostgreSQL implementation of ScheduledEventRepository.
#[derive(Clone)]
pub struct PostgresScheduledEventRepository {
    client: PostgresClient,
}

impl PostgresScheduledEventRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScheduledEventRepository for PostgresScheduledEventRepository {
    async fn record_event(&self, event: ScheduledEvent) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // A request books at most one event; replays hit the request_id
        // unique constraint and write nothing.
        let rows = conn
            .execute(
                "INSERT INTO scheduled_events (event_id, request_id, asset_name, \
                 ground_station, event_type, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (request_id) DO NOTHING",
                &[
                    &event.event_id,
                    &event.request_id,
                    &event.asset_name,
                    &event.ground_station,
                    &event.event_type.as_str(),
                    &event.created_at.unwrap_or_else(Utc::now),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows == 0 {
            debug!(request_id = %event.request_id, "event already recorded");
        }

        Ok(())
    }
}
