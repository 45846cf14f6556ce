//! WebSocket upgrade endpoint.

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;

use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// GET /ws
///
/// Authenticates the handshake (query `token` or bearer header) before
/// upgrading; unauthenticated attempts never reach the socket layer.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let gateway = Arc::clone(&state.gateway);
    let (claims, rooms) = gateway.authenticate(&query, &headers)?;

    Ok(ws.on_upgrade(move |socket| gateway.run_session(socket, claims, rooms))
        .into_response())
}
