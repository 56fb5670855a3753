//! Position Engine: tiered stakes compounding daily toward unlock.

use crate::config::{Policy, TierSpec};
use crate::db::repo::{accounts, counters, positions, Repository};
use crate::domain::{Account, Address, Decimal, Position, PositionStatus, PositionTier};
use crate::error::CoreError;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one daily sweep over all active positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub processed: usize,
    pub unlocked: usize,
    pub still_active: usize,
    /// Positions that raced out of `active` between listing and apply.
    pub skipped: usize,
    pub failed: usize,
}

/// Result of retiring an unlocked position into a fresh premium stake.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvestOutcome {
    pub locked_profit: Decimal,
    pub retired_position_id: i64,
    pub new_position: Position,
}

pub struct PositionEngine {
    repo: Arc<Repository>,
    policy: Policy,
    /// Single-flight gate: one sweep at a time, manual or scheduled.
    sweep_gate: tokio::sync::Mutex<()>,
}

impl PositionEngine {
    pub fn new(repo: Arc<Repository>, policy: Policy) -> Self {
        Self {
            repo,
            policy,
            sweep_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Tier economics for an account about to open `tier`.
    fn tier_spec(&self, account: &Account, tier: PositionTier) -> Result<TierSpec, CoreError> {
        match tier {
            PositionTier::Starter => {
                if account.has_used_starter {
                    return Err(CoreError::StarterAlreadyUsed);
                }
                Ok(self.policy.tiers.starter)
            }
            PositionTier::Premium => Ok(self.policy.tiers.premium(account.premium_count)),
        }
    }

    /// Open a stake, debiting the account in the same transaction.
    pub async fn open_position(
        &self,
        wallet: &Address,
        tier: PositionTier,
    ) -> Result<Position, CoreError> {
        let mut tx = self.repo.begin().await?;

        let account = accounts::find_by_wallet(&mut tx, wallet)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

        // Rate is selected from the pre-increment premium count.
        let spec = self.tier_spec(&account, tier)?;

        let mut account =
            crate::engine::ledger::debit_for_stake(&mut tx, account.id, spec.principal).await?;

        match tier {
            PositionTier::Starter => account.has_used_starter = true,
            PositionTier::Premium => account.premium_count += 1,
        }
        accounts::store(&mut tx, &account, Utc::now()).await?;

        let position = positions::insert(&mut tx, account.id, tier, spec, Utc::now()).await?;
        tx.commit().await?;

        info!(
            wallet = %wallet,
            tier = %tier,
            principal = %spec.principal,
            daily_percent = %spec.daily_percent,
            position_id = position.id,
            "position opened"
        );
        Ok(position)
    }

    /// Apply one day of compound yield to an active position.
    ///
    /// Idempotence per calendar day is the sweep caller's contract; the
    /// engine applies exactly one compounding step per invocation.
    pub async fn apply_daily_yield(&self, position_id: i64) -> Result<Position, CoreError> {
        let mut tx = self.repo.begin().await?;

        let mut position = positions::by_id(&mut tx, position_id)
            .await?
            .ok_or(CoreError::PositionNotFound(position_id))?;

        if position.status != PositionStatus::Active {
            return Err(CoreError::NotActive);
        }

        let now = Utc::now();
        position.current_value = compound_once(position.current_value, position.daily_percent);
        position.yield_earned = position.current_value - position.principal;

        if position.yield_earned >= position.yield_goal {
            position.status = PositionStatus::Unlocked;
            position.unlocked_at = Some(now);
            info!(
                position_id,
                value = %position.current_value,
                "position unlocked, yield goal reached"
            );
        }
        position.last_yield_applied_at = Some(now);

        positions::store_yield(&mut tx, &position).await?;
        tx.commit().await?;

        Ok(position)
    }

    /// Run the daily sweep, refusing to overlap a sweep already in
    /// flight (scheduled or manually triggered).
    pub async fn run_daily_sweep(&self) -> Result<SweepReport, CoreError> {
        let _guard = self
            .sweep_gate
            .try_lock()
            .map_err(|_| CoreError::SweepInProgress)?;

        self.sweep_all_active().await
    }

    /// Compound every active position once.
    ///
    /// Each position commits in its own transaction so one corrupt row
    /// cannot stall yield for everyone else; failures are collected
    /// into the report.
    async fn sweep_all_active(&self) -> Result<SweepReport, CoreError> {
        let ids = {
            let mut conn = self.repo.acquire().await?;
            positions::active_ids(&mut conn).await?
        };

        let mut report = SweepReport::default();
        for id in &ids {
            match self.apply_daily_yield(*id).await {
                Ok(position) => {
                    report.processed += 1;
                    if position.status == PositionStatus::Unlocked {
                        report.unlocked += 1;
                    } else {
                        report.still_active += 1;
                        debug!(
                            position_id = *id,
                            value = %position.current_value,
                            days_remaining = days_remaining(&position),
                            "yield applied"
                        );
                    }
                }
                Err(CoreError::NotActive) => {
                    report.skipped += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    error!(position_id = *id, error = %e, "yield application failed");
                }
            }
        }

        {
            let mut conn = self.repo.acquire().await?;
            counters::stamp_sweep(&mut conn, Utc::now()).await?;
        }

        info!(
            total = ids.len(),
            unlocked = report.unlocked,
            still_active = report.still_active,
            skipped = report.skipped,
            failed = report.failed,
            "daily yield sweep finished"
        );
        Ok(report)
    }

    /// Roll an unlocked position into a fresh premium stake, locking
    /// the profit above the new principal. No balance debit: the funds
    /// never leave the position side of the ledger.
    pub async fn reinvest(
        &self,
        wallet: &Address,
        position_id: i64,
    ) -> Result<ReinvestOutcome, CoreError> {
        let mut tx = self.repo.begin().await?;

        let account = accounts::find_by_wallet(&mut tx, wallet)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(wallet.to_string()))?;

        let position = positions::by_id(&mut tx, position_id)
            .await?
            .ok_or(CoreError::PositionNotFound(position_id))?;

        if position.account_id != account.id {
            return Err(CoreError::NotOwner);
        }
        if position.status != PositionStatus::Unlocked {
            return Err(CoreError::NotUnlocked);
        }

        let spec = self.policy.tiers.premium(account.premium_count);
        if position.current_value < spec.principal {
            return Err(CoreError::InsufficientFunds {
                available: position.current_value,
                required: spec.principal,
            });
        }

        let locked_profit = position.current_value - spec.principal;
        let now = Utc::now();

        positions::mark_withdrawn(&mut tx, position.id, now).await?;
        crate::engine::ledger::add_locked_profit(&mut tx, account.id, locked_profit).await?;

        let mut account = account;
        account.premium_count += 1;
        accounts::store(&mut tx, &account, now).await?;

        let new_position =
            positions::insert(&mut tx, account.id, PositionTier::Premium, spec, now).await?;
        tx.commit().await?;

        info!(
            wallet = %wallet,
            retired = position.id,
            new_position = new_position.id,
            locked_profit = %locked_profit,
            "position reinvested"
        );
        Ok(ReinvestOutcome {
            locked_profit,
            retired_position_id: position.id,
            new_position,
        })
    }
}

/// One compounding step: `value * (1 + rate/100)`. The rate applies
/// to the grown base, not the principal.
pub fn compound_once(value: Decimal, rate_percent: Decimal) -> Decimal {
    value + rate_percent.percent_of(value)
}

/// Estimate whole days until an active position reaches its goal.
///
/// Display-only; unlock decisions come from the sweep. Degenerate
/// inputs (non-positive value, rate, or target) return 0 instead of
/// propagating NaN out of the logarithm.
pub fn days_remaining(position: &Position) -> i64 {
    if position.status != PositionStatus::Active {
        return 0;
    }

    let current = position.current_value.inner().to_f64().unwrap_or(0.0);
    let target = (position.principal + position.yield_goal)
        .inner()
        .to_f64()
        .unwrap_or(0.0);
    let rate = position.daily_percent.inner().to_f64().unwrap_or(0.0) / 100.0;

    if current <= 0.0 || target <= 0.0 || rate <= 0.0 {
        return 0;
    }
    if current >= target {
        return 0;
    }

    ((target / current).ln() / (1.0 + rate).ln()).ceil() as i64
}
