//! Ledger & yield computation core.
//!
//! Four engines own the money rules:
//! - `ledger` - per-account balance buckets and their invariants
//! - `positions` - staked position lifecycle and compound yield
//! - `referrals` - upline resolution and exactly-once commissions
//! - `withdrawals` - quotes, eligibility, taxed sweeps, admin settle
//!
//! `deposits` orchestrates ingestion across ledger, counters, and
//! referrals in one transaction.

pub mod deposits;
pub mod ledger;
pub mod positions;
pub mod referrals;
pub mod withdrawals;

pub use deposits::{DepositEngine, DepositRequest, IngestOutcome, ProcessedDeposit};
pub use positions::{days_remaining, PositionEngine, ReinvestOutcome, SweepReport};
pub use withdrawals::{WithdrawalEngine, WithdrawalQuote};
