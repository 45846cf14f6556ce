use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Task line row. Maps to `wms_task_lines`; destroyed with its task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskLine {
    pub id: i64,
    pub task_id: Uuid,
    pub product_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskLine {
    pub product_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity: i32,
}

/// Line joined to product and location reference data for task detail reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskLineDetail {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub product_name: String,
    pub from_location_id: Option<i64>,
    pub from_location_code: Option<String>,
    pub to_location_id: Option<i64>,
    pub to_location_code: Option<String>,
    pub quantity: i32,
    pub status: String,
}

impl TaskLine {
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        task_id: Uuid,
        line: &NewTaskLine,
    ) -> Result<TaskLine, sqlx::Error> {
        sqlx::query_as::<_, TaskLine>(
            "INSERT INTO wms_task_lines \
             (task_id, product_id, from_location_id, to_location_id, quantity, status) \
             VALUES ($1, $2, $3, $4, $5, 'created') \
             RETURNING id, task_id, product_id, from_location_id, to_location_id, \
                       quantity, status, created_at, updated_at",
        )
        .bind(task_id)
        .bind(line.product_id)
        .bind(line.from_location_id)
        .bind(line.to_location_id)
        .bind(line.quantity)
        .fetch_one(executor)
        .await
    }

    /// Ordered lines with product sku/name and location codes joined in.
    pub async fn details_for_task<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        task_id: Uuid,
    ) -> Result<Vec<TaskLineDetail>, sqlx::Error> {
        sqlx::query_as::<_, TaskLineDetail>(
            "SELECT l.id, l.product_id, p.sku, p.name AS product_name, \
                    l.from_location_id, fl.code AS from_location_code, \
                    l.to_location_id, tl.code AS to_location_code, \
                    l.quantity, l.status \
             FROM wms_task_lines l \
             JOIN wms_products p ON p.id = l.product_id \
             LEFT JOIN wms_locations fl ON fl.id = l.from_location_id \
             LEFT JOIN wms_locations tl ON tl.id = l.to_location_id \
             WHERE l.task_id = $1 \
             ORDER BY l.id ASC",
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}
