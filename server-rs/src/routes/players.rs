use axum::{
    extract::{Path, Query, State},
    Json,
};
use match_engine::models::{DiscoveryFilters, ProfileUpdate};
use match_engine::WorkflowError;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let profile = state.workflow.players.profile(&player.id).await?;
    Ok(Json(json!({ "player": profile })))
}

pub async fn update_me(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Json(body): Json<ProfileUpdate>,
) -> AppResult<Json<Value>> {
    let profile = state
        .workflow
        .players
        .update_profile(&player.actor(), body)
        .await?;
    Ok(Json(json!({ "player": profile })))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let card = state.workflow.players.card(&id).await?;
    Ok(Json(json!({ "player": card })))
}

/// Player discovery. Degrades to an empty list when the store is unavailable.
pub async fn discover(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Query(filters): Query<DiscoveryFilters>,
) -> AppResult<Json<Value>> {
    match state.workflow.players.discover(&player.actor(), &filters).await {
        Ok(players) => Ok(Json(json!({ "players": players }))),
        Err(WorkflowError::Store(e)) => {
            tracing::warn!(user_id = %player.id, "player discovery degraded: {e}");
            Ok(Json(json!({ "players": [], "degraded": true })))
        }
        Err(e) => Err(e.into()),
    }
}
