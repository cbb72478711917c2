use async_trait::async_trait;
use chrono::Utc;
use skytask_domain::{
    DomainError, DomainResult, ListOrdersInput, Order, OrderRepository,
};
use tracing::debug;

use crate::client::PostgresClient;
use crate::models::{self, OrderRow};

const ORDER_COLUMNS: &str = "order_id, latitude, longitude, priority, image_type, start_time, \
     end_time, delivery_deadline, repeat_order, revisit_count, revisit_frequency_amount, \
     revisit_frequency_unit, created_at";

/// PostgreSQL implementation of OrderRepository
#[derive(Clone)]
pub struct PostgresOrderRepository {
    client: PostgresClient,
}

impl PostgresOrderRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create_order(&self, order: Order) -> DomainResult<Order> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let revisit_count = models::int_column("revisit count", order.recurrence.revisit_count)?;
        let frequency_amount = order
            .recurrence
            .frequency
            .map(|f| models::int_column("revisit frequency amount", f.amount))
            .transpose()?;
        let frequency_unit = order.recurrence.frequency.map(|f| f.unit.to_string());

        conn.execute(
            "INSERT INTO image_orders (order_id, latitude, longitude, priority, image_type, \
             start_time, end_time, delivery_deadline, repeat_order, revisit_count, \
             revisit_frequency_amount, revisit_frequency_unit, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            &[
                &order.order_id,
                &order.latitude,
                &order.longitude,
                &order.priority,
                &order.image_type.as_str(),
                &order.start_time,
                &order.end_time,
                &order.delivery_deadline,
                &order.recurrence.repeat,
                &revisit_count,
                &frequency_amount,
                &frequency_unit,
                &now,
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(order_id = %order.order_id, "stored image order");

        Ok(Order {
            created_at: Some(now),
            ..order
        })
    }

    async fn get_order(&self, order_id: &str) -> DomainResult<Option<Order>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                format!("SELECT {ORDER_COLUMNS} FROM image_orders WHERE order_id = $1").as_str(),
                &[&order_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|r| OrderRow::from_row(&r).into_domain()).transpose()
    }

    async fn list_orders(&self, input: ListOrdersInput) -> DomainResult<Vec<Order>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = if input.all {
            conn.query(
                format!("SELECT {ORDER_COLUMNS} FROM image_orders ORDER BY created_at").as_str(),
                &[],
            )
            .await
        } else {
            let page = i64::from(input.page.max(1));
            let per_page = i64::from(input.per_page);
            conn.query(
                format!(
                    "SELECT {ORDER_COLUMNS} FROM image_orders ORDER BY created_at \
                     LIMIT $1 OFFSET $2"
                )
                .as_str(),
                &[&per_page, &((page - 1) * per_page)],
            )
            .await
        }
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows.iter()
            .map(|r| OrderRow::from_row(r).into_domain())
            .collect()
    }
}
