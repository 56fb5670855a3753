use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::db::repo::{counters, positions};
use crate::error::CoreError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_deposits: String,
    pub total_users: i64,
    pub paying_users: i64,
    pub withdrawals_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sweep_at: Option<i64>,
    pub active_positions: i64,
    pub unlocked_positions: i64,
    pub withdrawn_positions: i64,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, CoreError> {
    let mut conn = state.repo.acquire().await?;
    let counters = counters::get(&mut conn).await?;
    let (active, unlocked, withdrawn) = positions::status_counts(&mut conn).await?;

    Ok(Json(StatsResponse {
        total_deposits: counters.total_deposits.to_canonical_string(),
        total_users: counters.total_users,
        paying_users: counters.paying_users,
        withdrawals_unlocked: counters.withdrawals_unlocked,
        unlock_date: counters.unlock_date.map(|t| t.timestamp_millis()),
        last_sweep_at: counters.last_sweep_at.map(|t| t.timestamp_millis()),
        active_positions: active,
        unlocked_positions: unlocked,
        withdrawn_positions: withdrawn,
    }))
}
