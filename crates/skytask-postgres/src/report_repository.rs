use async_trait::async_trait;
use skytask_domain::{DomainError, DomainResult, ReportRepository};
use tokio_postgres::Row;

use crate::client::PostgresClient;

/// PostgreSQL implementation of ReportRepository. Every method is a
/// single aggregate query; no snapshot isolation across them.
#[derive(Clone)]
pub struct PostgresReportRepository {
    client: PostgresClient,
}

impl PostgresReportRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn scalar_count(&self, query: &str) -> DomainResult<i64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(query, &[])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    async fn grouped_counts(&self, query: &str) -> DomainResult<Vec<(String, i64)>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(query, &[])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(group_count).collect())
    }
}

fn group_count(row: &Row) -> (String, i64) {
    (row.get(0), row.get(1))
}

#[async_trait]
impl ReportRepository for PostgresReportRepository {
    async fn count_orders(&self) -> DomainResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM image_orders").await
    }

    async fn count_requests(&self) -> DomainResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM schedule_requests")
            .await
    }

    async fn request_counts_by_type(&self) -> DomainResult<Vec<(String, i64)>> {
        self.grouped_counts(
            "SELECT order_type, COUNT(*) FROM schedule_requests \
             GROUP BY order_type ORDER BY order_type",
        )
        .await
    }

    async fn request_counts_by_status(
        &self,
        order_type: Option<String>,
    ) -> DomainResult<Vec<(String, i64)>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = match &order_type {
            Some(order_type) => {
                conn.query(
                    "SELECT status, COUNT(*) FROM schedule_requests \
                     WHERE order_type = $1 GROUP BY status ORDER BY status",
                    &[order_type],
                )
                .await
            }
            None => {
                conn.query(
                    "SELECT status, COUNT(*) FROM schedule_requests \
                     GROUP BY status ORDER BY status",
                    &[],
                )
                .await
            }
        }
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(group_count).collect())
    }

    async fn request_counts_by_reason(
        &self,
        order_type: Option<String>,
        status: String,
    ) -> DomainResult<Vec<(Option<String>, i64)>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = match &order_type {
            Some(order_type) => {
                conn.query(
                    "SELECT status_reason, COUNT(*) FROM schedule_requests \
                     WHERE order_type = $1 AND status = $2 \
                     GROUP BY status_reason ORDER BY status_reason",
                    &[order_type, &status],
                )
                .await
            }
            None => {
                conn.query(
                    "SELECT status_reason, COUNT(*) FROM schedule_requests \
                     WHERE status = $1 \
                     GROUP BY status_reason ORDER BY status_reason",
                    &[&status],
                )
                .await
            }
        }
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
    }

    async fn event_counts_by_asset(&self) -> DomainResult<Vec<(String, i64)>> {
        self.grouped_counts(
            "SELECT asset_name, COUNT(*) FROM scheduled_events \
             GROUP BY asset_name ORDER BY asset_name",
        )
        .await
    }

    async fn event_counts_by_asset_and_type(
        &self,
        asset_name: String,
    ) -> DomainResult<Vec<(String, i64)>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT event_type, COUNT(*) FROM scheduled_events \
                 WHERE asset_name = $1 GROUP BY event_type ORDER BY event_type",
                &[&asset_name],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(group_count).collect())
    }

    async fn contact_counts_by_ground_station(&self) -> DomainResult<Vec<(String, i64)>> {
        self.grouped_counts(
            "SELECT ground_station, COUNT(*) FROM scheduled_events \
             WHERE ground_station IS NOT NULL \
             GROUP BY ground_station ORDER BY ground_station",
        )
        .await
    }
}
