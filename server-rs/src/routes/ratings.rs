use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use match_engine::models::SubmitRatingRequest;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::auth::AuthPlayer;
use crate::AppState;

pub async fn submit_rating(
    State(state): State<AppState>,
    player: axum::Extension<AuthPlayer>,
    Path(match_id): Path<String>,
    Json(body): Json<SubmitRatingRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let rated = body.rated_player_id.clone();
    let rating = state
        .workflow
        .ratings
        .submit(&match_id, &player.actor(), body)
        .await?;
    let summary = state.workflow.ratings.summary(&rated).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "rating": rating, "summary": summary })),
    ))
}

pub async fn player_ratings(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> AppResult<Json<Value>> {
    let ratings = state.workflow.ratings.ratings_for(&player_id).await?;
    let summary = state.workflow.ratings.summary(&player_id).await?;
    Ok(Json(json!({ "ratings": ratings, "summary": summary })))
}
