//! Operator read and status endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Operator, OperatorStatus};
use crate::services::operator_service::OperatorListPage;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OperatorListQuery {
    pub status: Option<String>,
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

#[derive(Debug, Deserialize)]
pub struct UpdateOperatorStatusBody {
    pub status: String,
}

/// GET /api/operators
pub async fn list_operators(
    State(state): State<AppState>,
    Query(query): Query<OperatorListQuery>,
) -> ApiResult<Json<OperatorListPage>> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            raw.parse::<OperatorStatus>()
                .map_err(ApiError::bad_request)
        })
        .transpose()?;

    let page = state
        .operator_service
        .list_operators(status, query.page, query.limit)
        .await?;
    Ok(Json(page))
}

/// GET /api/operators/:id
pub async fn get_operator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Operator>> {
    let operator = state.operator_service.get_operator(id).await?;
    Ok(Json(operator))
}

/// PATCH /api/operators/:id/status
pub async fn update_operator_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateOperatorStatusBody>,
) -> ApiResult<Json<Operator>> {
    let status: OperatorStatus = body
        .status
        .parse()
        .map_err(ApiError::bad_request)?;

    let operator = state.operator_service.update_status(id, status).await?;
    Ok(Json(operator))
}
