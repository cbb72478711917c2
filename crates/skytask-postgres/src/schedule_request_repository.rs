use async_trait::async_trait;
use chrono::Utc;
use skytask_domain::{
    DomainError, DomainResult, ListOrderRequestsInput, RequestInsert, RequestStatus,
    ScheduleRequest, ScheduleRequestDraft, ScheduleRequestRepository, TransitionOutcome,
    TransitionStatusInput,
};
use tracing::debug;

use crate::client::PostgresClient;
use crate::models::{self, ScheduleRequestRow};

const REQUEST_COLUMNS: &str = "request_id, order_id, order_type, visit_index, window_start, \
     window_end, status, status_reason, reason_code, created_at, updated_at";

/// PostgreSQL implementation of ScheduleRequestRepository.
///
/// Creation relies on the `(order_id, visit_index)` unique constraint for
/// idempotency; transitions are a single conditional UPDATE so racing
/// writers for one request are serialized by row-level locking.
#[derive(Clone)]
pub struct PostgresScheduleRequestRepository {
    client: PostgresClient,
}

impl PostgresScheduleRequestRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn fetch_request(
        &self,
        conn: &deadpool_postgres::Client,
        request_id: &str,
    ) -> DomainResult<Option<ScheduleRequest>> {
        let row = conn
            .query_opt(
                format!("SELECT {REQUEST_COLUMNS} FROM schedule_requests WHERE request_id = $1")
                    .as_str(),
                &[&request_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|r| ScheduleRequestRow::from_row(&r).into_domain())
            .transpose()
    }
}

#[async_trait]
impl ScheduleRequestRepository for PostgresScheduleRequestRepository {
    async fn create_request(&self, draft: ScheduleRequestDraft) -> DomainResult<RequestInsert> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let visit_index = models::int_column("visit index", draft.visit_index)?;

        let inserted = conn
            .query_opt(
                format!(
                    "INSERT INTO schedule_requests (request_id, order_id, order_type, \
                     visit_index, window_start, window_end, status, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                     ON CONFLICT (order_id, visit_index) DO NOTHING
                     RETURNING {REQUEST_COLUMNS}"
                )
                .as_str(),
                &[
                    &draft.request_id,
                    &draft.order_id,
                    &draft.order_type.as_str(),
                    &visit_index,
                    &draft.window_start,
                    &draft.window_end,
                    &RequestStatus::Pending.as_str(),
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if let Some(row) = inserted {
            debug!(
                request_id = %draft.request_id,
                order_id = %draft.order_id,
                visit_index = draft.visit_index,
                "created schedule request"
            );
            return Ok(RequestInsert::Created(
                ScheduleRequestRow::from_row(&row).into_domain()?,
            ));
        }

        // Dedup key already present: return the stored row.
        let existing = conn
            .query_one(
                format!(
                    "SELECT {REQUEST_COLUMNS} FROM schedule_requests \
                     WHERE order_id = $1 AND visit_index = $2"
                )
                .as_str(),
                &[&draft.order_id, &visit_index],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(RequestInsert::AlreadyExists(
            ScheduleRequestRow::from_row(&existing).into_domain()?,
        ))
    }

    async fn get_request(&self, request_id: &str) -> DomainResult<Option<ScheduleRequest>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        self.fetch_request(&conn, request_id).await
    }

    async fn list_order_requests(
        &self,
        input: ListOrderRequestsInput,
    ) -> DomainResult<Vec<ScheduleRequest>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let types: Option<Vec<String>> = input
            .order_types
            .map(|ts| ts.iter().map(|t| t.to_string()).collect());

        let mut query = format!(
            "SELECT {REQUEST_COLUMNS} FROM schedule_requests WHERE order_id = $1"
        );
        if types.is_some() {
            query.push_str(" AND order_type = ANY($2)");
        }
        query.push_str(" ORDER BY visit_index");
        if !input.all {
            let page = i64::from(input.page.max(1));
            let per_page = i64::from(input.per_page);
            query.push_str(&format!(
                " LIMIT {per_page} OFFSET {}",
                (page - 1) * per_page
            ));
        }

        let rows = match &types {
            Some(types) => conn.query(query.as_str(), &[&input.order_id, types]).await,
            None => conn.query(query.as_str(), &[&input.order_id]).await,
        }
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows.iter()
            .map(|r| ScheduleRequestRow::from_row(r).into_domain())
            .collect()
    }

    async fn transition_status(
        &self,
        input: TransitionStatusInput,
    ) -> DomainResult<TransitionOutcome> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let updated = conn
            .query_opt(
                format!(
                    "UPDATE schedule_requests
                     SET status = $2, status_reason = $3, reason_code = $4, updated_at = $5
                     WHERE request_id = $1 AND status = $6
                     RETURNING {REQUEST_COLUMNS}"
                )
                .as_str(),
                &[
                    &input.request_id,
                    &input.new_status.as_str(),
                    &input.status_reason,
                    &input.reason_code.as_str(),
                    &now,
                    &RequestStatus::Pending.as_str(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if let Some(row) = updated {
            return Ok(TransitionOutcome::Applied(
                ScheduleRequestRow::from_row(&row).into_domain()?,
            ));
        }

        // No pending row was updated: either the request does not exist
        // or it already reached a terminal state.
        match self.fetch_request(&conn, &input.request_id).await? {
            Some(current) => Ok(TransitionOutcome::NotPending(current)),
            None => Err(DomainError::RequestNotFound(input.request_id)),
        }
    }
}
