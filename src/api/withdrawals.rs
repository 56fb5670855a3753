use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Address, Withdrawal, WithdrawalKind};
use crate::engine::WithdrawalQuote;
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    pub wallet: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalBody {
    pub wallet: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub kind: String,
    pub gross_amount: String,
    pub tax_percent: String,
    pub tax_amount: String,
    pub net_amount: String,
    pub can_withdraw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BreakdownDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownDto {
    pub available_balance: String,
    pub locked_profits: String,
    pub unlocked_positions: String,
}

fn quote_dto(quote: &WithdrawalQuote) -> QuoteResponse {
    QuoteResponse {
        kind: quote.kind.as_str().to_string(),
        gross_amount: quote.gross_amount.to_canonical_string(),
        tax_percent: quote.tax_percent.to_canonical_string(),
        tax_amount: quote.tax_amount.to_canonical_string(),
        net_amount: quote.net_amount.to_canonical_string(),
        can_withdraw: quote.can_withdraw,
        breakdown: quote.breakdown.as_ref().map(|b| BreakdownDto {
            available_balance: b.available_balance.to_canonical_string(),
            locked_profits: b.locked_profits.to_canonical_string(),
            unlocked_positions: b.unlocked_positions.to_canonical_string(),
        }),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDto {
    pub id: i64,
    pub kind: String,
    pub gross_amount: String,
    pub tax_percent: String,
    pub tax_amount: String,
    pub net_amount: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

pub(crate) fn withdrawal_dto(withdrawal: &Withdrawal) -> WithdrawalDto {
    WithdrawalDto {
        id: withdrawal.id,
        kind: withdrawal.kind.as_str().to_string(),
        gross_amount: withdrawal.gross_amount.to_canonical_string(),
        tax_percent: withdrawal.tax_percent.to_canonical_string(),
        tax_amount: withdrawal.tax_amount.to_canonical_string(),
        net_amount: withdrawal.net_amount.to_canonical_string(),
        status: withdrawal.status.as_str().to_string(),
        tx_hash: withdrawal.tx_hash.clone(),
        created_at: withdrawal.created_at.timestamp_millis(),
        completed_at: withdrawal.completed_at.map(|t| t.timestamp_millis()),
    }
}

pub async fn get_quote(
    Query(params): Query<QuoteParams>,
    State(state): State<AppState>,
) -> Result<Json<QuoteResponse>, CoreError> {
    let wallet = Address::from_str(&params.wallet)?;
    let kind = WithdrawalKind::from_str(&params.kind).map_err(CoreError::InvalidInput)?;

    let quote = state.withdrawals.compute_withdrawable(&wallet, kind).await?;
    Ok(Json(quote_dto(&quote)))
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<CreateWithdrawalBody>,
) -> Result<Json<WithdrawalDto>, CoreError> {
    let wallet = Address::from_str(&body.wallet)?;
    let kind = WithdrawalKind::from_str(&body.kind).map_err(CoreError::InvalidInput)?;

    let withdrawal = state.withdrawals.create_withdrawal(&wallet, kind).await?;
    Ok(Json(withdrawal_dto(&withdrawal)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub withdrawals: Vec<WithdrawalDto>,
}

pub async fn get_history(
    Query(params): Query<HistoryParams>,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, CoreError> {
    let wallet = Address::from_str(&params.wallet)?;

    let withdrawals = state.withdrawals.history(&wallet).await?;
    Ok(Json(HistoryResponse {
        withdrawals: withdrawals.iter().map(withdrawal_dto).collect(),
    }))
}
