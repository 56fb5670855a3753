//! Staked positions: tiered, compounding, forward-only lifecycle.

use crate::domain::Decimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named economics a position is opened under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionTier {
    /// One-time entry tier, gated by `Account::has_used_starter`.
    Starter,
    /// Repeatable tier whose daily rate steps down with `premium_count`.
    Premium,
}

impl PositionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionTier::Starter => "starter",
            PositionTier::Premium => "premium",
        }
    }
}

impl FromStr for PositionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(PositionTier::Starter),
            "premium" => Ok(PositionTier::Premium),
            other => Err(format!("unknown position tier: {}", other)),
        }
    }
}

impl std::fmt::Display for PositionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forward-only: active -> unlocked -> withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Active,
    Unlocked,
    Withdrawn,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Active => "active",
            PositionStatus::Unlocked => "unlocked",
            PositionStatus::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PositionStatus::Active),
            "unlocked" => Ok(PositionStatus::Unlocked),
            "withdrawn" => Ok(PositionStatus::Withdrawn),
            other => Err(format!("unknown position status: {}", other)),
        }
    }
}

/// A fixed-principal stake compounding daily toward its yield goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub id: i64,
    pub account_id: i64,
    pub tier: PositionTier,
    pub principal: Decimal,
    /// Starts equal to `principal`, grows by compounding. Never below
    /// `principal`.
    pub current_value: Decimal,
    /// `current_value - principal`, denormalized for display.
    pub yield_earned: Decimal,
    /// Daily compound rate in percent, fixed at open.
    pub daily_percent: Decimal,
    /// Target yield; reaching it unlocks the position.
    pub yield_goal: Decimal,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub last_yield_applied_at: Option<DateTime<Utc>>,
}
