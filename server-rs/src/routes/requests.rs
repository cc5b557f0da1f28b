use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use match_engine::models::AcceptRequestBody;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

pub async fn send_request(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(match_id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let request = state
        .workflow
        .requests
        .request(&match_id, &player.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "request": request }))))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(match_id): Path<String>,
) -> AppResult<Json<Value>> {
    let cancelled = state
        .workflow
        .requests
        .cancel(&match_id, &player.actor())
        .await?;
    Ok(Json(json!({ "cancelled": cancelled })))
}

pub async fn incoming_requests(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let requests = state.workflow.requests.incoming(&player.actor()).await?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn outgoing_requests(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let requests = state.workflow.requests.outgoing(&player.actor()).await?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn accept_request(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
    Json(body): Json<AcceptRequestBody>,
) -> AppResult<Json<Value>> {
    let request = state
        .workflow
        .requests
        .accept(&id, &body.match_id, &body.requester_id, &player.actor())
        .await?;
    Ok(Json(json!({ "request": request })))
}

pub async fn reject_request(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let request = state.workflow.requests.reject(&id, &player.actor()).await?;
    Ok(Json(json!({ "request": request })))
}
