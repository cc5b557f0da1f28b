use axum::{
    extract::{Path, State},
    Json,
};
use match_engine::models::MatchFilters;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::models::SetRoleRequest;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let users = state.workflow.players.list_users(&player.actor()).await?;
    Ok(Json(json!({ "users": users, "total": users.len() })))
}

pub async fn set_role(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(user_id): Path<String>,
    Json(body): Json<SetRoleRequest>,
) -> AppResult<Json<Value>> {
    let user = state
        .workflow
        .players
        .set_role(&player.actor(), &user_id, body.role)
        .await?;
    tracing::info!(
        admin_id = %player.id,
        user_id = %user_id,
        role = body.role.as_str(),
        "role changed"
    );
    Ok(Json(json!({ "user": user })))
}

pub async fn list_matches(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let matches = state.workflow.matches.list(&MatchFilters::default()).await?;
    Ok(Json(json!({ "matches": matches, "total": matches.len() })))
}

pub async fn delete_match(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(match_id): Path<String>,
) -> AppResult<Json<Value>> {
    state
        .workflow
        .matches
        .delete(&player.actor(), &match_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
