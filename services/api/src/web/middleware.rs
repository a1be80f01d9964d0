//! services/api/src/web/middleware.rs
//!
//! Identity middleware for the progress routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use uuid::Uuid;

/// Header carrying the already authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that extracts the user id from the `x-user-id` header.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
