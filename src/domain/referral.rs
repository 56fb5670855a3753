//! Referral awards: exactly-once commission attribution.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One commission payout for one (beneficiary, depositor, deposit,
/// level) combination.
///
/// The four-part key is unique in storage; re-running attribution for a
/// deposit skips rows that already exist instead of double-paying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralAward {
    pub id: i64,
    /// The up-line account receiving the commission.
    pub beneficiary_account_id: i64,
    /// The depositor whose deposit triggered it.
    pub source_account_id: i64,
    pub deposit_id: i64,
    /// 1 = direct referrer, up to 5.
    pub level: u8,
    /// Percentage of the deposit paid at this level.
    pub percentage: Decimal,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Per-level aggregate of a beneficiary's referral earnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelEarnings {
    pub level: u8,
    pub award_count: i64,
    pub total: Decimal,
}
