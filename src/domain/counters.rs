//! Platform-wide aggregate counters, a single durable row.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate state mutated by account and deposit lifecycle events.
///
/// Kept as an explicit row updated under the same transactional
/// discipline as accounts, never as in-process state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalCounters {
    pub total_deposits: Decimal,
    pub total_users: i64,
    /// Accounts that have crossed their first deposit.
    pub paying_users: i64,
    pub withdrawals_unlocked: bool,
    pub unlock_date: Option<DateTime<Utc>>,
    pub last_sweep_at: Option<DateTime<Utc>>,
}
