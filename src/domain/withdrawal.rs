//! Withdrawals: taxed fund sweeps with a pending -> terminal lifecycle.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which buckets a withdrawal sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalKind {
    /// Available balance + locked profits + unlocked positions.
    Personal,
    /// Referral balance only.
    Referral,
}

impl WithdrawalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalKind::Personal => "personal",
            WithdrawalKind::Referral => "referral",
        }
    }
}

impl FromStr for WithdrawalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(WithdrawalKind::Personal),
            "referral" => Ok(WithdrawalKind::Referral),
            other => Err(format!("unknown withdrawal kind: {}", other)),
        }
    }
}

/// Pending until an operator settles it; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Failed => "failed",
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "completed" => Ok(WithdrawalStatus::Completed),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "failed" => Ok(WithdrawalStatus::Failed),
            other => Err(format!("unknown withdrawal status: {}", other)),
        }
    }
}

/// A withdrawal request. Invariant: `gross_amount = tax_amount +
/// net_amount`, exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub account_id: i64,
    pub kind: WithdrawalKind,
    pub gross_amount: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub net_amount: Decimal,
    /// Set when an operator completes the payout on-chain.
    pub tx_hash: Option<String>,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
