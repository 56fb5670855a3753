use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::db::repo::{accounts, deposits};
use crate::domain::{Address, Decimal};
use crate::engine::{DepositRequest, IngestOutcome};
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestDepositBody {
    pub wallet: String,
    /// Decimal string; kept lossless end to end.
    pub amount: String,
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestDepositResponse {
    pub processed: bool,
    pub deposit_id: i64,
    pub tx_hash: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_balance: Option<String>,
    pub is_new_account: bool,
    pub is_first_deposit: bool,
    pub referral_awards: usize,
}

pub async fn ingest_deposit(
    State(state): State<AppState>,
    Json(body): Json<IngestDepositBody>,
) -> Result<Json<IngestDepositResponse>, CoreError> {
    let wallet = Address::from_str(&body.wallet)?;
    let amount = Decimal::from_str_canonical(&body.amount)
        .map_err(|_| CoreError::InvalidInput(format!("amount {:?}", body.amount)))?;
    let referrer = body
        .referrer
        .as_deref()
        .map(Address::from_str)
        .transpose()?;

    let outcome = state
        .deposits
        .ingest(DepositRequest {
            wallet,
            amount,
            tx_hash: body.tx_hash,
            block_number: body.block_number,
            referrer,
        })
        .await?;

    let response = match outcome {
        IngestOutcome::Processed(processed) => IngestDepositResponse {
            processed: true,
            deposit_id: processed.deposit.id,
            tx_hash: processed.deposit.tx_hash,
            amount: processed.deposit.amount.to_canonical_string(),
            available_balance: Some(processed.account.available_balance.to_canonical_string()),
            is_new_account: processed.is_new_account,
            is_first_deposit: processed.is_first_deposit,
            referral_awards: processed.awards.len(),
        },
        IngestOutcome::Duplicate(existing) => IngestDepositResponse {
            processed: false,
            deposit_id: existing.id,
            tx_hash: existing.tx_hash,
            amount: existing.amount.to_canonical_string(),
            available_balance: None,
            is_new_account: false,
            is_first_deposit: false,
            referral_awards: 0,
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositDto {
    pub id: i64,
    pub amount: String,
    pub tx_hash: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDepositsResponse {
    pub total_deposited: String,
    pub deposits: Vec<DepositDto>,
}

pub async fn get_account_deposits(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountDepositsResponse>, CoreError> {
    let wallet = Address::from_str(&wallet)?;

    let mut conn = state.repo.acquire().await?;
    let account = accounts::find_by_wallet(&mut conn, &wallet)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

    let rows = deposits::list_for_account(&mut conn, account.id).await?;
    Ok(Json(AccountDepositsResponse {
        total_deposited: account.total_deposited.to_canonical_string(),
        deposits: rows
            .iter()
            .map(|d| DepositDto {
                id: d.id,
                amount: d.amount.to_canonical_string(),
                tx_hash: d.tx_hash.clone(),
                status: d.status.as_str().to_string(),
                created_at: d.created_at.timestamp_millis(),
            })
            .collect(),
    }))
}
