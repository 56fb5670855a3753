//! SQLite storage for the ledger.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Transaction-scoped row operations, split by entity under `repo`

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
