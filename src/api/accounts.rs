use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::str::FromStr;

use crate::api::AppState;
use crate::db::repo::{accounts, referrals};
use crate::domain::{Account, Address, REFERRAL_LEVELS};
use crate::error::CoreError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_address: Option<String>,
    pub available_balance: String,
    pub referral_balance: String,
    pub locked_profits: String,
    pub spendable: String,
    pub total_deposited: String,
    pub total_referral_earned: String,
    pub total_withdrawn: String,
    pub level_referrals: [i64; REFERRAL_LEVELS],
    pub has_used_starter: bool,
    pub premium_count: i64,
    pub earnings_by_level: Vec<LevelEarningsDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEarningsDto {
    pub level: u8,
    pub award_count: i64,
    pub total: String,
}

fn account_dto(account: &Account, earnings: Vec<LevelEarningsDto>) -> AccountResponse {
    AccountResponse {
        wallet_address: account.wallet_address.to_string(),
        referrer_address: account.referrer_address.as_ref().map(|a| a.to_string()),
        available_balance: account.available_balance.to_canonical_string(),
        referral_balance: account.referral_balance.to_canonical_string(),
        locked_profits: account.locked_profits.to_canonical_string(),
        spendable: account.spendable().to_canonical_string(),
        total_deposited: account.total_deposited.to_canonical_string(),
        total_referral_earned: account.total_referral_earned.to_canonical_string(),
        total_withdrawn: account.total_withdrawn.to_canonical_string(),
        level_referrals: account.level_referrals,
        has_used_starter: account.has_used_starter,
        premium_count: account.premium_count,
        earnings_by_level: earnings,
    }
}

pub async fn get_account(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, CoreError> {
    let wallet = Address::from_str(&wallet)?;

    let mut conn = state.repo.acquire().await?;
    let account = accounts::find_by_wallet(&mut conn, &wallet)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

    let earnings = referrals::earnings_by_level(&mut conn, account.id)
        .await?
        .into_iter()
        .map(|e| LevelEarningsDto {
            level: e.level,
            award_count: e.award_count,
            total: e.total.to_canonical_string(),
        })
        .collect();

    Ok(Json(account_dto(&account, earnings)))
}
