//! Order-event ingress: normalize then enqueue for the generation worker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::generation::normalize_order_event;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// POST /api/order-events
///
/// Validates the raw payload into a normalized event and enqueues it on the
/// durable generation queue. The returned job id is the event key; the
/// generation service's idempotency gate makes duplicate keys no-ops.
pub async fn submit_order_event(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let event = normalize_order_event(&payload)?;

    let queue_name = state.config.queue.generation_queue.clone();
    let job = serde_json::to_value(&event)
        .map_err(crate::error::WmsError::from)?;
    state.queue_client.send(&queue_name, &job, None).await?;

    info!(
        event_key = %event.event_key,
        source_document_id = %event.source_document_id,
        "Order event accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "type": event.event_type.as_str(),
            "sourceDocumentId": event.source_document_id,
            "eventKey": event.event_key,
            "queueName": queue_name,
            "jobId": event.event_key,
        })),
    ))
}
