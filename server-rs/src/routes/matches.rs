use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use match_engine::models::{CreateMatchRequest, MatchFilters};
use match_engine::WorkflowError;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

/// Open and upcoming matches. Degrades to an empty list when the store is unavailable.
pub async fn list_matches(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Query(filters): Query<MatchFilters>,
) -> AppResult<Json<Value>> {
    match state.workflow.matches.list(&filters).await {
        Ok(matches) => Ok(Json(json!({ "matches": matches }))),
        Err(WorkflowError::Store(e)) => {
            tracing::warn!(user_id = %player.id, "match listing degraded: {e}");
            Ok(Json(json!({ "matches": [], "degraded": true })))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn create_match(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Json(body): Json<CreateMatchRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let created = state.workflow.create_match(&player.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn my_matches(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let mine = state.workflow.matches.mine(&player.actor()).await?;
    Ok(Json(json!(mine)))
}

pub async fn invitable_matches(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let matches = state.workflow.matches.invitable(&player.actor()).await?;
    Ok(Json(json!({ "matches": matches })))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let m = state.workflow.matches.get(&id).await?;
    Ok(Json(json!({ "match": m })))
}

pub async fn join_match(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let m = state.workflow.matches.join(&id, &player.actor()).await?;
    Ok(Json(json!({ "match": m })))
}

pub async fn leave_match(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let m = state.workflow.matches.leave(&id, &player.actor()).await?;
    Ok(Json(json!({ "match": m })))
}
