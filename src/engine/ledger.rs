//! Account Ledger: balance-bucket mutations with invariant enforcement.
//!
//! Every function here runs on a caller-owned transaction and either
//! applies its full effect or fails without touching state. No bucket
//! ever goes negative; a debit that would overdraw fails instead.

use crate::db::repo::accounts;
use crate::domain::{Account, Address, Decimal};
use crate::error::CoreError;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

async fn require(conn: &mut SqliteConnection, account_id: i64) -> Result<Account, CoreError> {
    accounts::find_by_id(conn, account_id)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(format!("id {}", account_id)))
}

/// Create an account, snapshotting its referrer once and forever.
pub async fn create_account(
    conn: &mut SqliteConnection,
    wallet: &Address,
    referrer: Option<&Address>,
) -> Result<Account, CoreError> {
    if accounts::find_by_wallet(conn, wallet).await?.is_some() {
        return Err(CoreError::DuplicateAccount(wallet.to_string()));
    }

    let account = accounts::insert(conn, wallet, referrer, Utc::now()).await?;
    info!(wallet = %wallet, referrer = ?referrer.map(|r| r.as_str()), "account created");
    Ok(account)
}

/// Credit a confirmed deposit into the available bucket.
pub async fn credit_deposit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: Decimal,
) -> Result<Account, CoreError> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount);
    }

    let mut account = require(conn, account_id).await?;
    account.available_balance += amount;
    account.total_deposited += amount;
    accounts::store(conn, &account, Utc::now()).await?;
    Ok(account)
}

/// Debit the cost of a stake, referral balance first.
///
/// Spending bonus money before principal is policy: referral earnings
/// fund stakes before deposited funds do.
pub async fn debit_for_stake(
    conn: &mut SqliteConnection,
    account_id: i64,
    cost: Decimal,
) -> Result<Account, CoreError> {
    let mut account = require(conn, account_id).await?;

    if account.spendable() < cost {
        return Err(CoreError::InsufficientFunds {
            available: account.spendable(),
            required: cost,
        });
    }

    if account.referral_balance >= cost {
        account.referral_balance -= cost;
    } else {
        let remainder = cost - account.referral_balance;
        account.referral_balance = Decimal::zero();
        account.available_balance -= remainder;
    }

    accounts::store(conn, &account, Utc::now()).await?;
    Ok(account)
}

/// Lock profit carried out of a reinvested position.
pub async fn add_locked_profit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: Decimal,
) -> Result<Account, CoreError> {
    if amount.is_negative() {
        return Err(CoreError::InvalidAmount);
    }

    let mut account = require(conn, account_id).await?;
    account.locked_profits += amount;
    accounts::store(conn, &account, Utc::now()).await?;
    Ok(account)
}

/// Credit a referral commission and bump the level counter.
pub async fn add_referral_earning(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: Decimal,
    level: u8,
) -> Result<Account, CoreError> {
    if amount.is_negative() || level == 0 || level as usize > crate::domain::REFERRAL_LEVELS {
        return Err(CoreError::InvalidAmount);
    }

    let mut account = require(conn, account_id).await?;
    account.referral_balance += amount;
    account.total_referral_earned += amount;
    account.level_referrals[(level - 1) as usize] += 1;
    accounts::store(conn, &account, Utc::now()).await?;
    Ok(account)
}

/// Zero the buckets consumed by a withdrawal and accrue the payout.
///
/// Personal withdrawals drain available balance and locked profits
/// (unlocked positions are retired by the Position side); referral
/// withdrawals drain only the referral balance.
pub async fn sweep_for_withdrawal(
    conn: &mut SqliteConnection,
    account_id: i64,
    net: Decimal,
    reset_referral: bool,
) -> Result<Account, CoreError> {
    let mut account = require(conn, account_id).await?;

    if reset_referral {
        account.referral_balance = Decimal::zero();
    } else {
        account.available_balance = Decimal::zero();
        account.locked_profits = Decimal::zero();
    }
    account.total_withdrawn += net;

    accounts::store(conn, &account, Utc::now()).await?;
    Ok(account)
}

/// Return a rejected withdrawal's gross back to the available bucket.
pub async fn refund(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: Decimal,
) -> Result<Account, CoreError> {
    if amount.is_negative() {
        return Err(CoreError::InvalidAmount);
    }

    let mut account = require(conn, account_id).await?;
    account.available_balance += amount;
    accounts::store(conn, &account, Utc::now()).await?;
    info!(account_id, amount = %amount, "withdrawal refunded to available balance");
    Ok(account)
}
