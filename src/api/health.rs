use crate::api::AppState;
use crate::error::CoreError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, CoreError> {
    let _: (i64,) = sqlx::query_as("SELECT 1")
        .fetch_one(state.repo.pool())
        .await
        .map_err(CoreError::Db)?;

    Ok(Json(serde_json::json!({"status": "ready"})))
}
