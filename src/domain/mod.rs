//! Domain model for the savings-platform ledger.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - The wallet Address primitive (case-normalized account key)
//! - The six persisted record types: Account, Position, Deposit,
//!   ReferralAward, Withdrawal, GlobalCounters

pub mod account;
pub mod counters;
pub mod decimal;
pub mod deposit;
pub mod position;
pub mod primitives;
pub mod referral;
pub mod withdrawal;

pub use account::{Account, REFERRAL_LEVELS};
pub use counters::GlobalCounters;
pub use decimal::Decimal;
pub use deposit::{normalize_tx_hash, Deposit, DepositStatus};
pub use position::{Position, PositionStatus, PositionTier};
pub use primitives::{Address, AddressParseError};
pub use referral::{LevelEarnings, ReferralAward};
pub use withdrawal::{Withdrawal, WithdrawalKind, WithdrawalStatus};
