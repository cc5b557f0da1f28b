use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use match_engine::models::SendInvitationRequest;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

pub async fn send_invitation(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(match_id): Path<String>,
    Json(body): Json<SendInvitationRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let invitation = state
        .workflow
        .invitations
        .send(&player.actor(), &match_id, &body.player_id)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "invitation": invitation }))))
}

pub async fn my_invitations(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let invitations = state.workflow.invitations.pending_for(&player.actor()).await?;
    Ok(Json(json!({ "invitations": invitations })))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let invitation = state.workflow.invitations.accept(&id, &player.actor()).await?;
    Ok(Json(json!({ "invitation": invitation })))
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let invitation = state.workflow.invitations.decline(&id, &player.actor()).await?;
    Ok(Json(json!({ "invitation": invitation })))
}
