use axum::{
    extract::{Path, Query, State},
    Json,
};
use match_engine::WorkflowError;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::models::NotificationQuery;
use crate::AppState;

/// Inbox, optionally one category. Degrades to an empty list when the store is unavailable.
pub async fn list_notifications(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Value>> {
    match state
        .workflow
        .notifications
        .list(&player.actor(), query.category)
        .await
    {
        Ok(list) => Ok(Json(json!(list))),
        Err(WorkflowError::Store(e)) => {
            tracing::warn!(user_id = %player.id, "notification listing degraded: {e}");
            Ok(Json(json!({
                "notifications": [],
                "unreadCount": 0,
                "degraded": true,
            })))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn mark_read(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    state
        .workflow
        .notifications
        .mark_read(&id, &player.actor())
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
) -> AppResult<Json<Value>> {
    let updated = state
        .workflow
        .notifications
        .mark_all_read(&player.actor())
        .await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    state
        .workflow
        .notifications
        .delete(&id, &player.actor())
        .await?;
    Ok(Json(json!({ "success": true })))
}
