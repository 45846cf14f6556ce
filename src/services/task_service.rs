//! Task state-machine service: optimistic-version status transitions with
//! audit logging, plus detail and listing reads.

use crate::error::{Result, WmsError};
use crate::events::{EventBus, RealtimeEventType};
use crate::models::{
    NewTaskStatusLog, Operator, PaginationInfo, Task, TaskLine, TaskLineDetail, TaskStatusLog,
    Zone, ZoneSummary,
};
use crate::state_machine::TaskStatus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Parameters for a status transition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatusRequest {
    pub expected_version: Option<i32>,
    pub changed_by_operator_id: Option<Uuid>,
}

/// Task with zone summary and ordered, joined lines.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub zone: Option<ZoneSummary>,
    pub lines: Vec<TaskLineDetail>,
    pub total_quantity: i64,
}

/// One page of a task listing.
#[derive(Debug, Clone, Serialize)]
pub struct TaskListPage {
    pub tasks: Vec<Task>,
    pub pagination: PaginationInfo,
}

/// Filters for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub operator_id: Option<Uuid>,
    pub zone_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TaskService {
    pool: PgPool,
    bus: EventBus,
}

impl TaskService {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Apply one status transition under a row lock.
    ///
    /// The UPDATE is additionally predicated on the version the transaction
    /// read; a racing writer makes it affect zero rows, which surfaces as a
    /// conflict rather than a lost update. Realtime publishes happen after
    /// commit and never fail the call.
    pub async fn update_status(
        &self,
        task_id: Uuid,
        new_status: TaskStatus,
        request: UpdateStatusRequest,
    ) -> Result<Task> {
        if let Some(operator_id) = request.changed_by_operator_id {
            if !Operator::exists(&self.pool, operator_id).await? {
                return Err(WmsError::InvalidInput(format!(
                    "operator {operator_id} does not exist"
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let task = Task::find_by_id_for_update(&mut *tx, task_id)
            .await?
            .ok_or_else(|| WmsError::NotFound(format!("task {task_id} not found")))?;

        if let Some(expected) = request.expected_version {
            if expected != task.version {
                return Err(WmsError::Conflict(format!(
                    "version mismatch: expected {expected}, current {}",
                    task.version
                )));
            }
        }

        let current_status: TaskStatus = task
            .parsed_status()
            .map_err(WmsError::Internal)?;
        current_status
            .check_transition(new_status)
            .map_err(|e| WmsError::Conflict(e.to_string()))?;

        let now = Utc::now();
        let started_at = match (new_status, task.started_at) {
            (TaskStatus::InProgress, None) => Some(now),
            (_, existing) => existing,
        };
        let completed_at = if new_status == TaskStatus::Completed {
            Some(now)
        } else {
            task.completed_at
        };
        let actual_time_seconds = if new_status == TaskStatus::Completed {
            match started_at {
                Some(started) => Some((now - started).num_seconds().max(0) as i32),
                None => task.actual_time_seconds,
            }
        } else {
            task.actual_time_seconds
        };

        let updated = sqlx::query_as::<_, Task>(
            "UPDATE wms_tasks SET \
                 status = $3, \
                 started_at = $4, \
                 completed_at = $5, \
                 actual_time_seconds = $6, \
                 version = version + 1, \
                 updated_at = $7 \
             WHERE id = $1 AND version = $2 \
             RETURNING id, task_type, priority, status, zone_id, assigned_operator_id, \
                       source_document_id, estimated_time_seconds, actual_time_seconds, version, \
                       started_at, completed_at, created_at, updated_at",
        )
        .bind(task.id)
        .bind(task.version)
        .bind(new_status.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(actual_time_seconds)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            WmsError::Conflict(format!("task {task_id} was modified concurrently"))
        })?;

        TaskStatusLog::create(
            &mut *tx,
            &NewTaskStatusLog {
                task_id: task.id,
                from_status: current_status.as_str().to_string(),
                to_status: new_status.as_str().to_string(),
                task_version: updated.version,
                changed_by_operator_id: request.changed_by_operator_id,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            task_id = %task.id,
            from = %current_status,
            to = %new_status,
            version = updated.version,
            "Task status updated"
        );

        self.publish_transition(&updated, current_status).await;

        Ok(updated)
    }

    /// Best-effort realtime fan-out after commit. Failures are logged, never
    /// surfaced.
    async fn publish_transition(&self, task: &Task, previous_status: TaskStatus) {
        let payload = json!({
            "taskId": task.id,
            "previousStatus": previous_status.as_str(),
            "status": task.status,
            "version": task.version,
            "assignedOperatorId": task.assigned_operator_id,
            "zoneId": task.zone_id,
        });

        if let Err(e) = self
            .bus
            .publish(RealtimeEventType::TaskUpdated, payload.clone())
            .await
        {
            warn!(task_id = %task.id, error = %e, "Failed to publish TASK_UPDATED");
        }

        if task.status == TaskStatus::Assigned.as_str() && task.assigned_operator_id.is_some() {
            if let Err(e) = self.bus.publish(RealtimeEventType::TaskAssigned, payload).await {
                warn!(task_id = %task.id, error = %e, "Failed to publish TASK_ASSIGNED");
            }
        }
    }

    /// Task with zone summary and ordered lines; 404 when absent.
    pub async fn get_task_with_details(&self, task_id: Uuid) -> Result<TaskDetails> {
        let task = Task::find_by_id(&self.pool, task_id)
            .await?
            .ok_or_else(|| WmsError::NotFound(format!("task {task_id} not found")))?;

        let zone = Zone::find_summary(&self.pool, task.zone_id).await?;
        let lines = TaskLine::details_for_task(&self.pool, task_id).await?;
        let total_quantity = lines.iter().map(|l| l.quantity as i64).sum();

        Ok(TaskDetails {
            task,
            zone,
            lines,
            total_quantity,
        })
    }

    /// Audit trail for one task, oldest transition first.
    pub async fn get_task_history(&self, task_id: Uuid) -> Result<Vec<TaskStatusLog>> {
        if Task::find_by_id(&self.pool, task_id).await?.is_none() {
            return Err(WmsError::NotFound(format!("task {task_id} not found")));
        }
        Ok(TaskStatusLog::list_for_task(&self.pool, task_id).await?)
    }

    /// Paginated listing ordered `priority DESC, created_at ASC`.
    pub async fn list_tasks(
        &self,
        filter: TaskListFilter,
        page: i64,
        limit: i64,
    ) -> Result<TaskListPage> {
        if page < 1 {
            return Err(WmsError::InvalidInput(format!("page must be >= 1, got {page}")));
        }
        if !(1..=200).contains(&limit) {
            return Err(WmsError::InvalidInput(format!(
                "limit must be between 1 and 200, got {limit}"
            )));
        }

        let mut scope = Task::scope();
        if let Some(status) = filter.status {
            scope = scope.with_status(status);
        }
        if let Some(operator_id) = filter.operator_id {
            scope = scope.with_operator(operator_id);
        }
        if let Some(zone_id) = filter.zone_id {
            scope = scope.with_zone(zone_id);
        }

        let total = scope.count(&self.pool).await?;
        let tasks = scope.paginate(&self.pool, page, limit).await?;

        Ok(TaskListPage {
            tasks,
            pagination: PaginationInfo::new(page, limit, total),
        })
    }
}
