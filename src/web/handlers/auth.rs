//! Login endpoint.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::models::User;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let user = User::find_by_username(&state.pool, &request.username)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    let verified = bcrypt::verify(&request.password, &user.password_hash)
        .map_err(|_| ApiError::unauthorized("invalid credentials"))?;
    if !verified {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let token = state.authenticator.issue_token(&user)?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "operatorId": user.operator_id,
        },
    })))
}
