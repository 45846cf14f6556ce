//! Labor analytics endpoints: overview, per-operator performance, and
//! zone workload.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::models::{LaborDailyMetric, Operator, Task};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    50
}

fn parse_date(raw: Option<&str>) -> ApiResult<NaiveDate> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("invalid date: {raw} (expected YYYY-MM-DD)"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub date: Option<String>,
}

/// GET /api/labor/overview
///
/// Current task counts by status plus the aggregated metric averages for
/// the requested date (default today).
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> ApiResult<Json<Value>> {
    let date = parse_date(query.date.as_deref())?;

    let counts: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM wms_tasks GROUP BY status")
            .fetch_all(&state.pool)
            .await?;
    let task_counts: serde_json::Map<String, Value> = counts
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();

    let (avg_task_time, avg_utilization, total_completed) =
        LaborDailyMetric::averages_for_date(&state.pool, date).await?;

    Ok(Json(json!({
        "date": date,
        "taskCounts": task_counts,
        "metrics": {
            "totalTasksCompleted": total_completed,
            "averageTaskTimeSeconds": avg_task_time,
            "averageUtilizationPercent": avg_utilization,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub date: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct OperatorPerformance {
    pub operator: Operator,
    pub metrics: Option<LaborDailyMetric>,
    pub active_task: Option<Task>,
}

/// GET /api/labor/operator-performance
///
/// Per-operator daily metrics plus the current active task, chosen by
/// status priority (in_progress first) then task priority.
pub async fn operator_performance(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> ApiResult<Json<Value>> {
    let date = parse_date(query.date.as_deref())?;
    if query.page < 1 || !(1..=200).contains(&query.limit) {
        return Err(ApiError::bad_request("invalid pagination parameters"));
    }

    let (operators, total) =
        Operator::list(&state.pool, None, query.page, query.limit).await?;

    let metrics = LaborDailyMetric::list_for_date(&state.pool, date, 1, 1000).await?;

    let mut rows = Vec::with_capacity(operators.len());
    for operator in operators {
        let operator_metrics = metrics
            .iter()
            .find(|m| m.operator_id == operator.id)
            .cloned();
        let active_task = Task::active_for_operator(&state.pool, operator.id).await?;
        rows.push(OperatorPerformance {
            operator,
            metrics: operator_metrics,
            active_task,
        });
    }

    Ok(Json(json!({
        "date": date,
        "operators": rows,
        "pagination": crate::models::PaginationInfo::new(query.page, query.limit, total),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ZoneWorkloadQuery {
    pub warehouse_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ZoneWorkload {
    pub zone_id: i64,
    pub code: String,
    pub name: String,
    pub created_count: i64,
    pub assigned_count: i64,
    pub in_progress_count: i64,
    pub paused_count: i64,
    pub completed_count: i64,
    pub cancelled_count: i64,
    pub failed_count: i64,
    pub average_priority: f64,
}

/// GET /api/labor/zone-workload
pub async fn zone_workload(
    State(state): State<AppState>,
    Query(query): Query<ZoneWorkloadQuery>,
) -> ApiResult<Json<Value>> {
    if query.page < 1 || !(1..=200).contains(&query.limit) {
        return Err(ApiError::bad_request("invalid pagination parameters"));
    }

    let zones = sqlx::query_as::<_, ZoneWorkload>(
        "SELECT z.id AS zone_id, z.code, z.name, \
                COUNT(t.id) FILTER (WHERE t.status = 'created') AS created_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'assigned') AS assigned_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'in_progress') AS in_progress_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'paused') AS paused_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'completed') AS completed_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'cancelled') AS cancelled_count, \
                COUNT(t.id) FILTER (WHERE t.status = 'failed') AS failed_count, \
                COALESCE(AVG(t.priority), 0)::DOUBLE PRECISION AS average_priority \
         FROM wms_zones z \
         LEFT JOIN wms_tasks t ON t.zone_id = z.id \
         WHERE ($1::BIGINT IS NULL OR z.warehouse_id = $1) \
         GROUP BY z.id, z.code, z.name \
         ORDER BY z.id ASC \
         LIMIT $2 OFFSET $3",
    )
    .bind(query.warehouse_id)
    .bind(query.limit)
    .bind((query.page - 1) * query.limit)
    .fetch_all(&state.pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM wms_zones z WHERE ($1::BIGINT IS NULL OR z.warehouse_id = $1)",
    )
    .bind(query.warehouse_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({
        "zones": zones,
        "pagination": crate::models::PaginationInfo::new(query.page, query.limit, total),
    })))
}
