use axum::{extract::Request, middleware::Next, response::Response};
use match_engine::models::Role;

use crate::error::AppError;
use crate::middleware::auth::AuthPlayer;

/// Middleware: requires the `admin` role. Runs after `authenticate`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let player = req
        .extensions()
        .get::<AuthPlayer>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    if player.role != Role::Admin {
        return Err(AppError::Forbidden("Requires admin role".into()));
    }

    Ok(next.run(req).await)
}
