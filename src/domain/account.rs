//! Account: per-wallet balance buckets and referral counters.

use crate::domain::{Address, Decimal};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of referral levels the platform pays out on.
pub const REFERRAL_LEVELS: usize = 5;

/// One ledger account per wallet address.
///
/// Balance buckets (`available_balance`, `referral_balance`,
/// `locked_profits`) are invariantly non-negative; the lifetime
/// counters (`total_*`) only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub wallet_address: Address,
    /// Set at most once, at creation. Immutable afterwards.
    pub referrer_address: Option<Address>,
    pub available_balance: Decimal,
    pub referral_balance: Decimal,
    pub locked_profits: Decimal,
    pub total_deposited: Decimal,
    pub total_referral_earned: Decimal,
    pub total_withdrawn: Decimal,
    /// Referral headcount per level, index 0 = direct referrals.
    pub level_referrals: [i64; REFERRAL_LEVELS],
    pub has_used_starter: bool,
    pub premium_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Funds spendable on a stake: referral bonus plus deposits.
    pub fn spendable(&self) -> Decimal {
        self.available_balance + self.referral_balance
    }

    pub fn direct_referrals(&self) -> i64 {
        self.level_referrals[0]
    }
}
