use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{extract_bearer, AuthPlayer};
use crate::models::auth::*;
use crate::AppState;

pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = state
        .identity
        .sign_up(&body.email, &body.password, &body.display_name)
        .await?;
    let session = state.identity.sign_in(&body.email, &body.password).await?;
    let profile = state.workflow.players.profile(&user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": session.access_token,
            "expiresIn": session.expires_in,
            "user": profile,
        })),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> AppResult<Json<Value>> {
    let session = state.identity.sign_in(&body.email, &body.password).await?;
    let profile = state.workflow.players.profile(&session.user_id).await?;

    Ok(Json(json!({
        "token": session.access_token,
        "expiresIn": session.expires_in,
        "user": profile,
    })))
}

pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let token = extract_bearer(&headers)
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;
    state.identity.sign_out(&token).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn me(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let profile = state.workflow.players.profile(&player.id).await?;
    Ok(Json(json!({ "user": profile })))
}
