//! Health probe.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

/// GET /api/health
///
/// Reports overall status plus database reachability and generation-queue
/// depth. Unreachable database means the process is not serving.
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|e| ApiError::internal(format!("database unreachable: {e}")))?;

    let queue_depth = state
        .queue_client
        .queue_depth(&state.config.queue.generation_queue)
        .await
        .ok();

    let bus_stats = state.bus.stats();

    Ok(Json(json!({
        "status": "ok",
        "database": "up",
        "queue": queue_depth,
        "realtime": {
            "connections": state.gateway.registry().connection_count(),
            "eventsPublished": bus_stats.events_published,
            "eventsReceived": bus_stats.events_received,
            "handlerErrors": bus_stats.handler_errors,
        },
    })))
}
