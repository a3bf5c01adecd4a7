//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::rest::ErrorResponse;
use crate::web::state::AppState;

/// Middleware that validates the bearer token and extracts the owner id.
///
/// If valid, inserts the `OwnerId` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Missing or invalid Authorization header")),
            )
        })?;

    // 2. Verify it and resolve the owner
    let owner_id = state.token_verifier.verify(token).await.map_err(|e| {
        warn!("Token verification failed: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid or expired token")),
        )
    })?;

    // 3. Insert owner_id into request extensions
    req.extensions_mut().insert(owner_id);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
