//! Withdrawal Engine: quotes, eligibility, atomic sweeps, admin paths.

use crate::config::Policy;
use crate::db::repo::{accounts, positions, referrals, withdrawals, Repository};
use crate::domain::{
    Account, Address, Decimal, Withdrawal, WithdrawalKind,
};
use crate::engine::ledger;
use crate::error::CoreError;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::info;

/// What a withdrawal would pay out right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalQuote {
    pub kind: WithdrawalKind,
    pub gross_amount: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub net_amount: Decimal,
    pub can_withdraw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<QuoteBreakdown>,
}

/// Where a personal withdrawal's gross comes from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBreakdown {
    pub available_balance: Decimal,
    pub locked_profits: Decimal,
    pub unlocked_positions: Decimal,
}

pub struct WithdrawalEngine {
    repo: Arc<Repository>,
    policy: Policy,
}

impl WithdrawalEngine {
    pub fn new(repo: Arc<Repository>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    /// Quote without committing anything.
    pub async fn compute_withdrawable(
        &self,
        wallet: &Address,
        kind: WithdrawalKind,
    ) -> Result<WithdrawalQuote, CoreError> {
        let mut conn = self.repo.acquire().await?;
        let account = accounts::find_by_wallet(&mut conn, wallet)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

        quote(&mut conn, &account, kind, &self.policy).await
    }

    /// Create a withdrawal: gate, re-quote, sweep, one transaction.
    ///
    /// The quote is recomputed inside the transaction so the swept
    /// amount can never be stale relative to the buckets it zeroes.
    pub async fn create_withdrawal(
        &self,
        wallet: &Address,
        kind: WithdrawalKind,
    ) -> Result<Withdrawal, CoreError> {
        let mut tx = self.repo.begin().await?;

        let account = accounts::find_by_wallet(&mut tx, wallet)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

        if self.policy.gate_enabled {
            check_eligibility(&mut tx, &account, &self.policy).await?;
        }

        let quote = quote(&mut tx, &account, kind, &self.policy).await?;
        if !quote.gross_amount.is_positive() {
            return Err(CoreError::NoFunds);
        }
        if quote.net_amount < self.policy.min_withdrawal_net {
            return Err(CoreError::BelowMinimum {
                net: quote.net_amount,
                minimum: self.policy.min_withdrawal_net,
            });
        }

        let now = Utc::now();
        let withdrawal = withdrawals::insert_pending(
            &mut tx,
            account.id,
            kind,
            quote.gross_amount,
            quote.tax_percent,
            quote.tax_amount,
            quote.net_amount,
            now,
        )
        .await?;

        if kind == WithdrawalKind::Personal {
            positions::retire_unlocked(&mut tx, account.id, now).await?;
        }
        ledger::sweep_for_withdrawal(
            &mut tx,
            account.id,
            quote.net_amount,
            kind == WithdrawalKind::Referral,
        )
        .await?;

        tx.commit().await?;

        info!(
            wallet = %wallet,
            kind = %withdrawal.kind.as_str(),
            gross = %withdrawal.gross_amount,
            tax = %withdrawal.tax_amount,
            net = %withdrawal.net_amount,
            "withdrawal created"
        );
        Ok(withdrawal)
    }

    /// Operator confirms the on-chain payout. Pending only.
    pub async fn approve(&self, withdrawal_id: i64, tx_hash: &str) -> Result<Withdrawal, CoreError> {
        let mut tx = self.repo.begin().await?;

        let updated =
            withdrawals::complete_pending(&mut tx, withdrawal_id, tx_hash, Utc::now()).await?;
        if updated == 0 {
            return match withdrawals::by_id(&mut tx, withdrawal_id).await? {
                Some(_) => Err(CoreError::AlreadyProcessed),
                None => Err(CoreError::WithdrawalNotFound(withdrawal_id)),
            };
        }

        let withdrawal = withdrawals::by_id(&mut tx, withdrawal_id)
            .await?
            .ok_or(CoreError::WithdrawalNotFound(withdrawal_id))?;
        tx.commit().await?;

        info!(withdrawal_id, tx_hash, "withdrawal approved");
        Ok(withdrawal)
    }

    /// Operator rejects a pending withdrawal; the status flip and the
    /// gross refund land in one transaction so a crash between them
    /// cannot lose the money.
    pub async fn reject(&self, withdrawal_id: i64) -> Result<Withdrawal, CoreError> {
        let mut tx = self.repo.begin().await?;

        let withdrawal = withdrawals::by_id(&mut tx, withdrawal_id)
            .await?
            .ok_or(CoreError::WithdrawalNotFound(withdrawal_id))?;

        let updated = withdrawals::reject_pending(&mut tx, withdrawal_id, Utc::now()).await?;
        if updated == 0 {
            return Err(CoreError::AlreadyProcessed);
        }

        ledger::refund(&mut tx, withdrawal.account_id, withdrawal.gross_amount).await?;

        let withdrawal = withdrawals::by_id(&mut tx, withdrawal_id)
            .await?
            .ok_or(CoreError::WithdrawalNotFound(withdrawal_id))?;
        tx.commit().await?;

        info!(withdrawal_id, gross = %withdrawal.gross_amount, "withdrawal rejected and refunded");
        Ok(withdrawal)
    }

    pub async fn pending(&self) -> Result<Vec<Withdrawal>, CoreError> {
        let mut conn = self.repo.acquire().await?;
        Ok(withdrawals::list_pending(&mut conn).await?)
    }

    pub async fn history(&self, wallet: &Address) -> Result<Vec<Withdrawal>, CoreError> {
        let mut conn = self.repo.acquire().await?;
        let account = accounts::find_by_wallet(&mut conn, wallet)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;
        Ok(withdrawals::list_for_account(&mut conn, account.id).await?)
    }
}

/// Compute the quote for an account on the given connection.
///
/// Tax rounds to cents; net is the exact remainder, so
/// `gross == tax + net` always holds.
async fn quote(
    conn: &mut SqliteConnection,
    account: &Account,
    kind: WithdrawalKind,
    policy: &Policy,
) -> Result<WithdrawalQuote, CoreError> {
    let (gross, breakdown) = match kind {
        WithdrawalKind::Personal => {
            let unlocked = positions::unlocked_value(conn, account.id).await?;
            let gross = account.available_balance + account.locked_profits + unlocked;
            (
                gross,
                Some(QuoteBreakdown {
                    available_balance: account.available_balance,
                    locked_profits: account.locked_profits,
                    unlocked_positions: unlocked,
                }),
            )
        }
        WithdrawalKind::Referral => (account.referral_balance, None),
    };

    let tax_amount = policy.tax_percent.percent_of(gross).round_dp(2);
    let net_amount = gross - tax_amount;

    Ok(WithdrawalQuote {
        kind,
        gross_amount: gross,
        tax_percent: policy.tax_percent,
        tax_amount,
        net_amount,
        can_withdraw: gross.is_positive(),
        breakdown,
    })
}

/// Referral-count gate: enough active premium referrals at levels 1
/// and 2. The error carries the actual counts for user messaging.
async fn check_eligibility(
    conn: &mut SqliteConnection,
    account: &Account,
    policy: &Policy,
) -> Result<(), CoreError> {
    let level1 =
        referrals::count_active_premium_downline(conn, &account.wallet_address, 1).await?;
    let level2 =
        referrals::count_active_premium_downline(conn, &account.wallet_address, 2).await?;

    if level1 < policy.gate_level1_required || level2 < policy.gate_level2_required {
        return Err(CoreError::NotEligible {
            level1,
            level1_required: policy.gate_level1_required,
            level2,
            level2_required: policy.gate_level2_required,
        });
    }

    Ok(())
}
