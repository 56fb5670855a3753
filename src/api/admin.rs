use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::withdrawals::{withdrawal_dto, WithdrawalDto};
use crate::api::AppState;
use crate::engine::SweepReport;
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    pub tx_hash: String,
}

pub async fn pending_withdrawals(
    State(state): State<AppState>,
) -> Result<Json<Vec<WithdrawalDto>>, CoreError> {
    let pending = state.withdrawals.pending().await?;
    Ok(Json(pending.iter().map(withdrawal_dto).collect()))
}

pub async fn approve_withdrawal(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<WithdrawalDto>, CoreError> {
    let withdrawal = state.withdrawals.approve(id, &body.tx_hash).await?;
    Ok(Json(withdrawal_dto(&withdrawal)))
}

pub async fn reject_withdrawal(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalDto>, CoreError> {
    let withdrawal = state.withdrawals.reject(id).await?;
    Ok(Json(withdrawal_dto(&withdrawal)))
}

/// Manual sweep trigger; shares the engine's single-flight gate with
/// the scheduler, so it conflicts instead of overlapping.
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, CoreError> {
    let report = state.positions.run_daily_sweep().await?;
    Ok(Json(report))
}
