//! Deposits: one row per on-chain funding event, keyed by tx hash.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Confirmed,
    Failed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Confirmed => "confirmed",
            DepositStatus::Failed => "failed",
        }
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DepositStatus::Pending),
            "confirmed" => Ok(DepositStatus::Confirmed),
            "failed" => Ok(DepositStatus::Failed),
            other => Err(format!("unknown deposit status: {}", other)),
        }
    }
}

/// A confirmed funding event credited to an account.
///
/// `tx_hash` is globally unique; re-ingesting the same hash is a
/// benign no-op, never a double credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    /// Normalized lowercase transaction hash, the idempotency key.
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Normalize a tx hash the same way addresses are normalized, so the
/// unique constraint sees one spelling.
pub fn normalize_tx_hash(tx_hash: &str) -> String {
    tx_hash.trim().to_lowercase()
}
