//! Domain primitives: wallet `Address` and shared enums.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Wallet address, the case-insensitive account key.
///
/// Normalized to lowercase at construction so lookups, referrer links
/// and unique constraints all agree on one spelling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Normalize an already-validated address string.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 20 hex bytes")]
    BadLength,
    #[error("address contains non-hex characters")]
    NotHex,
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        if hex.len() != 40 {
            return Err(AddressParseError::BadLength);
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressParseError::NotHex);
        }
        Ok(Address::new(s))
    }
}
