use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of warehouse work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Pick,
    Putaway,
    Replenish,
    Count,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Pick => "pick",
            TaskType::Putaway => "putaway",
            TaskType::Replenish => "replenish",
            TaskType::Count => "count",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pick" => Ok(TaskType::Pick),
            "putaway" => Ok(TaskType::Putaway),
            "replenish" => Ok(TaskType::Replenish),
            "count" => Ok(TaskType::Count),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Task row. Maps to `wms_tasks`.
///
/// `version` starts at 1 and increments by exactly one on every mutation;
/// every UPDATE is predicated on the version it read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub task_type: String,
    pub priority: i32,
    pub status: String,
    pub zone_id: i64,
    pub assigned_operator_id: Option<Uuid>,
    pub source_document_id: String,
    pub estimated_time_seconds: i32,
    pub actual_time_seconds: Option<i32>,
    pub version: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New task for creation. Tasks always start at `created`, version 1, with
/// no operator and no start/complete timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub task_type: TaskType,
    pub priority: i32,
    pub zone_id: i64,
    pub source_document_id: String,
    pub estimated_time_seconds: i32,
}

/// Pagination metadata returned alongside listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationInfo {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

const TASK_COLUMNS: &str = "id, task_type, priority, status, zone_id, assigned_operator_id, \
     source_document_id, estimated_time_seconds, actual_time_seconds, version, \
     started_at, completed_at, created_at, updated_at";

impl Task {
    /// Parsed status. Rows only ever hold values written through
    /// [`TaskStatus::as_str`], so a parse failure means corrupt data.
    pub fn parsed_status(&self) -> Result<TaskStatus, String> {
        self.status.parse()
    }

    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new_task: NewTask,
    ) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO wms_tasks \
             (id, task_type, priority, status, zone_id, source_document_id, estimated_time_seconds, version) \
             VALUES ($1, $2, $3, 'created', $4, $5, $6, 1) \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(Uuid::new_v4())
            .bind(new_task.task_type.as_str())
            .bind(new_task.priority)
            .bind(new_task.zone_id)
            .bind(&new_task.source_document_id)
            .bind(new_task.estimated_time_seconds)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM wms_tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the task row for the duration of the enclosing transaction.
    pub async fn find_by_id_for_update(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM wms_tasks WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// The operator's single active task, if any. Active = assigned,
    /// in_progress, or paused.
    pub async fn active_for_operator(
        pool: &PgPool,
        operator_id: Uuid,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM wms_tasks \
             WHERE assigned_operator_id = $1 \
               AND status IN ('assigned', 'in_progress', 'paused') \
             ORDER BY CASE status \
                 WHEN 'in_progress' THEN 0 \
                 WHEN 'paused' THEN 1 \
                 ELSE 2 END, \
               priority DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(operator_id)
            .fetch_optional(pool)
            .await
    }

    /// Candidate batch for the assignment loop: `created` tasks in priority
    /// order, locked with SKIP LOCKED so concurrent assigners never contend.
    pub async fn lock_created_batch(
        conn: &mut sqlx::PgConnection,
        limit: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM wms_tasks \
             WHERE status = 'created' \
             ORDER BY priority DESC, created_at ASC \
             LIMIT $1 \
             FOR UPDATE SKIP LOCKED"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await
    }

    /// Assign the task to an operator, predicated on it still being
    /// `created`. `None` means a racing writer (manual assignment or another
    /// assigner) got there first.
    pub async fn try_assign(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        operator_id: Uuid,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE wms_tasks SET \
                 status = 'assigned', \
                 assigned_operator_id = $2, \
                 version = version + 1, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'created' \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(operator_id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Start building a scoped listing query.
    pub fn scope() -> TaskScope {
        TaskScope::new()
    }
}

/// Query builder for task listings with optional filters, fixed ordering
/// (`priority DESC, created_at ASC`), and pagination.
pub struct TaskScope {
    status: Option<String>,
    operator_id: Option<Uuid>,
    zone_id: Option<i64>,
}

impl TaskScope {
    fn new() -> Self {
        Self {
            status: None,
            operator_id: None,
            zone_id: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status.as_str().to_string());
        self
    }

    pub fn with_operator(mut self, operator_id: Uuid) -> Self {
        self.operator_id = Some(operator_id);
        self
    }

    pub fn with_zone(mut self, zone_id: i64) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let mut has_conditions = false;

        if let Some(ref status) = self.status {
            builder.push(" WHERE status = ").push_bind(status.clone());
            has_conditions = true;
        }
        if let Some(operator_id) = self.operator_id {
            builder.push(if has_conditions { " AND " } else { " WHERE " });
            builder.push("assigned_operator_id = ").push_bind(operator_id);
            has_conditions = true;
        }
        if let Some(zone_id) = self.zone_id {
            builder.push(if has_conditions { " AND " } else { " WHERE " });
            builder.push("zone_id = ").push_bind(zone_id);
        }
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM wms_tasks");
        self.push_conditions(&mut builder);
        let (count,): (i64,) = builder.build_query_as().fetch_one(pool).await?;
        Ok(count)
    }

    pub async fn paginate(
        &self,
        pool: &PgPool,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM wms_tasks"));
        self.push_conditions(&mut builder);
        builder.push(" ORDER BY priority DESC, created_at ASC");
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind((page - 1) * limit);
        builder.build_query_as().fetch_all(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_round_trips() {
        for t in [TaskType::Pick, TaskType::Putaway, TaskType::Replenish, TaskType::Count] {
            assert_eq!(t.as_str().parse::<TaskType>().unwrap(), t);
        }
    }

    #[test]
    fn pagination_math() {
        let info = PaginationInfo::new(1, 50, 101);
        assert_eq!(info.total_pages, 3);
        let empty = PaginationInfo::new(1, 50, 0);
        assert_eq!(empty.total_pages, 0);
    }
}
