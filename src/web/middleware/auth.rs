//! Bearer-token authentication middleware for protected endpoints.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::web::auth::extract_bearer_token;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Validates the bearer token and stores the claims in request extensions
/// for handlers that need the caller's identity.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid authorization header"))?;

    let token = extract_bearer_token(auth_str)?;
    let claims = state.authenticator.validate(token)?;

    debug!(user_id = %claims.sub, "Authenticated request");
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
