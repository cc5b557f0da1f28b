use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let (backend, store_ok) = match &state.db {
        Some(pool) => (
            "postgres",
            sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(pool)
                .await
                .is_ok(),
        ),
        None => ("memory", true),
    };

    let status = if store_ok { "healthy" } else { "degraded" };
    Json(json!({
        "status": status,
        "store": backend,
        "storeOk": store_ok,
        "timestamp": chrono::Utc::now(),
    }))
}
