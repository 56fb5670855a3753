pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod scheduler;

pub use config::{Config, Policy};
pub use db::{init_db, Repository};
pub use domain::{
    Account, Address, Decimal, Deposit, GlobalCounters, Position, PositionStatus, PositionTier,
    ReferralAward, Withdrawal, WithdrawalKind, WithdrawalStatus,
};
pub use engine::{
    DepositEngine, DepositRequest, IngestOutcome, PositionEngine, SweepReport, WithdrawalEngine,
};
pub use error::CoreError;
