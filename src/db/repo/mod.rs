//! Row operations for ledger records.
//!
//! Every balance-touching operation runs inside one transaction, so
//! the functions here take a `&mut SqliteConnection` and compose under
//! a caller-owned `Repository::begin()`. Submodules by entity:
//! - `accounts` - account rows and balance buckets
//! - `deposits` - tx-hash-keyed funding events
//! - `positions` - staked position lifecycle rows
//! - `referrals` - award rows and downline queries
//! - `withdrawals` - withdrawal requests
//! - `counters` - the global counters row

pub mod accounts;
pub mod counters;
pub mod deposits;
pub mod positions;
pub mod referrals;
pub mod withdrawals;

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use tracing::warn;

/// Handle on the connection pool; transactions start here.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Begin a transaction for a logical ledger operation.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Check out a plain connection for read-only queries.
    pub async fn acquire(
        &self,
    ) -> Result<sqlx::pool::PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn to_ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn from_opt_ms(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.map(from_ms)
}

/// Parse a stored canonical decimal, falling back to zero on corrupt
/// data so one bad row cannot poison a whole query.
pub(crate) fn parse_money(field: &'static str, raw: &str) -> Decimal {
    Decimal::from_str_canonical(raw).unwrap_or_else(|e| {
        warn!(field, value = raw, error = %e, "failed to parse stored decimal, using 0");
        Decimal::zero()
    })
}

/// Lift an enum-codec failure into a sqlx decode error.
pub(crate) fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}
