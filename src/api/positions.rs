use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::db::repo::{accounts, positions};
use crate::domain::{Address, Decimal, Position, PositionStatus, PositionTier};
use crate::engine::days_remaining;
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionBody {
    pub wallet: String,
    pub tier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvestBody {
    pub wallet: String,
    pub position_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub id: i64,
    pub tier: String,
    pub principal: String,
    pub current_value: String,
    pub yield_earned: String,
    pub daily_percent: String,
    pub yield_goal: String,
    pub status: String,
    pub days_remaining: i64,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<i64>,
}

fn position_dto(position: &Position) -> PositionDto {
    PositionDto {
        id: position.id,
        tier: position.tier.as_str().to_string(),
        principal: position.principal.to_canonical_string(),
        current_value: position.current_value.to_canonical_string(),
        yield_earned: position.yield_earned.to_canonical_string(),
        daily_percent: position.daily_percent.to_canonical_string(),
        yield_goal: position.yield_goal.to_canonical_string(),
        status: position.status.as_str().to_string(),
        days_remaining: days_remaining(position),
        created_at: position.created_at.timestamp_millis(),
        unlocked_at: position.unlocked_at.map(|t| t.timestamp_millis()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPositionsResponse {
    pub positions: Vec<PositionDto>,
    pub active_count: usize,
    pub unlocked_count: usize,
    pub withdrawn_count: usize,
    /// Combined value of active and unlocked positions.
    pub total_value: String,
    pub total_yield: String,
}

pub async fn get_account_positions(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountPositionsResponse>, CoreError> {
    let wallet = Address::from_str(&wallet)?;

    let mut conn = state.repo.acquire().await?;
    let account = accounts::find_by_wallet(&mut conn, &wallet)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

    let all = positions::list_for_account(&mut conn, account.id).await?;

    let mut total_value = Decimal::zero();
    let mut total_yield = Decimal::zero();
    let mut active_count = 0;
    let mut unlocked_count = 0;
    let mut withdrawn_count = 0;
    for p in &all {
        match p.status {
            PositionStatus::Active => active_count += 1,
            PositionStatus::Unlocked => unlocked_count += 1,
            PositionStatus::Withdrawn => withdrawn_count += 1,
        }
        if p.status != PositionStatus::Withdrawn {
            total_value += p.current_value;
            total_yield += p.yield_earned;
        }
    }

    Ok(Json(AccountPositionsResponse {
        positions: all.iter().map(position_dto).collect(),
        active_count,
        unlocked_count,
        withdrawn_count,
        total_value: total_value.to_canonical_string(),
        total_yield: total_yield.to_canonical_string(),
    }))
}

pub async fn open_position(
    State(state): State<AppState>,
    Json(body): Json<OpenPositionBody>,
) -> Result<Json<PositionDto>, CoreError> {
    let wallet = Address::from_str(&body.wallet)?;
    let tier = PositionTier::from_str(&body.tier).map_err(CoreError::InvalidInput)?;

    let position = state.positions.open_position(&wallet, tier).await?;
    Ok(Json(position_dto(&position)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvestResponse {
    pub locked_profit: String,
    pub retired_position_id: i64,
    pub new_position: PositionDto,
}

pub async fn reinvest(
    State(state): State<AppState>,
    Json(body): Json<ReinvestBody>,
) -> Result<Json<ReinvestResponse>, CoreError> {
    let wallet = Address::from_str(&body.wallet)?;

    let outcome = state.positions.reinvest(&wallet, body.position_id).await?;
    Ok(Json(ReinvestResponse {
        locked_profit: outcome.locked_profit.to_canonical_string(),
        retired_position_id: outcome.retired_position_id,
        new_position: position_dto(&outcome.new_position),
    }))
}
