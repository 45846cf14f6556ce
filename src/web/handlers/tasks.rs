//! Task read and state-machine endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::task_service::{TaskDetails, TaskListFilter, TaskListPage};
use crate::services::UpdateStatusRequest;
use crate::state_machine::TaskStatus;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub operator_id: Option<Uuid>,
    pub zone_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    50
}

/// Body for status mutations: the caller's expected version (mandatory for
/// the HTTP surface) plus the acting operator.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusActionBody {
    pub version: i32,
    pub changed_by_operator_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchStatusBody {
    pub status: String,
    pub version: i32,
    pub changed_by_operator_id: Option<Uuid>,
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<TaskListPage>> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            raw.parse::<TaskStatus>()
                .map_err(|e| ApiError::bad_request(e))
        })
        .transpose()?;

    let page = state
        .task_service
        .list_tasks(
            TaskListFilter {
                status,
                operator_id: query.operator_id,
                zone_id: query.zone_id,
            },
            query.page,
            query.limit,
        )
        .await?;

    Ok(Json(page))
}

/// GET /api/tasks/:task_id
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskDetails>> {
    let details = state.task_service.get_task_with_details(task_id).await?;
    Ok(Json(details))
}

/// POST /api/tasks/:task_id/start
pub async fn start_task(
    state: State<AppState>,
    path: Path<Uuid>,
    body: Json<StatusActionBody>,
) -> ApiResult<Json<crate::models::Task>> {
    apply_action(state, path, body, TaskStatus::InProgress).await
}

/// POST /api/tasks/:task_id/complete
pub async fn complete_task(
    state: State<AppState>,
    path: Path<Uuid>,
    body: Json<StatusActionBody>,
) -> ApiResult<Json<crate::models::Task>> {
    apply_action(state, path, body, TaskStatus::Completed).await
}

/// POST /api/tasks/:task_id/pause
pub async fn pause_task(
    state: State<AppState>,
    path: Path<Uuid>,
    body: Json<StatusActionBody>,
) -> ApiResult<Json<crate::models::Task>> {
    apply_action(state, path, body, TaskStatus::Paused).await
}

/// POST /api/tasks/:task_id/cancel
pub async fn cancel_task(
    state: State<AppState>,
    path: Path<Uuid>,
    body: Json<StatusActionBody>,
) -> ApiResult<Json<crate::models::Task>> {
    apply_action(state, path, body, TaskStatus::Cancelled).await
}

async fn apply_action(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<StatusActionBody>,
    new_status: TaskStatus,
) -> ApiResult<Json<crate::models::Task>> {
    if body.version < 1 {
        return Err(ApiError::bad_request("version must be a positive integer"));
    }

    let task = state
        .task_service
        .update_status(
            task_id,
            new_status,
            UpdateStatusRequest {
                expected_version: Some(body.version),
                changed_by_operator_id: body.changed_by_operator_id,
            },
        )
        .await?;

    Ok(Json(task))
}

/// GET /api/tasks/:task_id/history
pub async fn task_history(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<crate::models::TaskStatusLog>>> {
    let history = state.task_service.get_task_history(task_id).await?;
    Ok(Json(history))
}

/// PATCH /api/tasks/:task_id/status
pub async fn patch_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<PatchStatusBody>,
) -> ApiResult<Json<crate::models::Task>> {
    if body.version < 1 {
        return Err(ApiError::bad_request("version must be a positive integer"));
    }
    let new_status: TaskStatus = body
        .status
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;

    let task = state
        .task_service
        .update_status(
            task_id,
            new_status,
            UpdateStatusRequest {
                expected_version: Some(body.version),
                changed_by_operator_id: body.changed_by_operator_id,
            },
        )
        .await?;

    Ok(Json(task))
}
