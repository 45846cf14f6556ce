use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit record of a task status transition. Maps to
/// `wms_task_status_logs`; rows outlive completed tasks and deleted
/// operators (`changed_by_operator_id` nulls out, timestamps and
/// `task_version` stay authoritative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskStatusLog {
    pub id: i64,
    pub task_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub task_version: i32,
    pub changed_by_operator_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskStatusLog {
    pub task_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub task_version: i32,
    pub changed_by_operator_id: Option<Uuid>,
}

impl TaskStatusLog {
    /// One row per successful transition, written inside the same
    /// transaction as the task update.
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new_log: &NewTaskStatusLog,
    ) -> Result<TaskStatusLog, sqlx::Error> {
        sqlx::query_as::<_, TaskStatusLog>(
            "INSERT INTO wms_task_status_logs \
             (task_id, from_status, to_status, task_version, changed_by_operator_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, task_id, from_status, to_status, task_version, \
                       changed_by_operator_id, changed_at",
        )
        .bind(new_log.task_id)
        .bind(&new_log.from_status)
        .bind(&new_log.to_status)
        .bind(new_log.task_version)
        .bind(new_log.changed_by_operator_id)
        .fetch_one(executor)
        .await
    }

    /// Transition history for one task, oldest first. The ordered
    /// `to_status` chain replays the task's path through the state machine.
    pub async fn list_for_task<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        task_id: Uuid,
    ) -> Result<Vec<TaskStatusLog>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatusLog>(
            "SELECT id, task_id, from_status, to_status, task_version, \
                    changed_by_operator_id, changed_at \
             FROM wms_task_status_logs \
             WHERE task_id = $1 \
             ORDER BY changed_at ASC, id ASC",
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}
