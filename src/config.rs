//! Environment-driven configuration.
//!
//! Every policy constant the platform applies (tax, minimums, referral
//! percentages, tier economics, eligibility gate) is a parameter here,
//! not a literal in engine code.

use crate::domain::{Decimal, REFERRAL_LEVELS};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Seconds between yield sweeps; one day in production.
    pub sweep_interval_secs: u64,
    pub policy: Policy,
}

/// Product policy knobs, injected into every engine.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Withdrawal tax in percent.
    pub tax_percent: Decimal,
    /// Minimum net payout a withdrawal must reach.
    pub min_withdrawal_net: Decimal,
    /// Commission percent per referral level, level 1 first.
    pub referral_level_percents: [Decimal; REFERRAL_LEVELS],
    /// Whether the referral-count withdrawal gate is enforced.
    pub gate_enabled: bool,
    pub gate_level1_required: i64,
    pub gate_level2_required: i64,
    /// Platform-wide goals that flip `withdrawals_unlocked`.
    pub global_deposit_goal: Decimal,
    pub global_wallet_goal: i64,
    pub tiers: TierTable,
}

/// Economics per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    pub principal: Decimal,
    pub daily_percent: Decimal,
    pub yield_goal: Decimal,
}

#[derive(Debug, Clone)]
pub struct TierTable {
    pub starter: TierSpec,
    pub premium_principal: Decimal,
    pub premium_yield_goal: Decimal,
    /// Daily percent by premium position ordinal; the last entry
    /// applies to every later position.
    pub premium_daily_percents: Vec<Decimal>,
}

impl TierTable {
    /// Premium economics for an account's nth premium position.
    pub fn premium(&self, premium_count: i64) -> TierSpec {
        let idx = (premium_count.max(0) as usize).min(self.premium_daily_percents.len() - 1);
        TierSpec {
            principal: self.premium_principal,
            daily_percent: self.premium_daily_percents[idx],
            yield_goal: self.premium_yield_goal,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16)?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let sweep_interval_secs = parse_or(&env_map, "SWEEP_INTERVAL_SECS", 86_400u64)?;

        Ok(Config {
            port,
            database_path,
            sweep_interval_secs,
            policy: Policy::from_env_map(&env_map)?,
        })
    }
}

impl Policy {
    pub fn from_env_map(env_map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let tax_percent = parse_decimal_or(env_map, "WITHDRAWAL_TAX_PERCENT", "12")?;
        let min_withdrawal_net = parse_decimal_or(env_map, "MIN_WITHDRAWAL_NET", "50")?;
        let referral_level_percents =
            parse_level_percents(env_map.get("REFERRAL_LEVEL_PERCENTS").map(|s| s.as_str()))?;
        let gate_enabled = parse_or(env_map, "WITHDRAWAL_GATE_ENABLED", true)?;
        let gate_level1_required = parse_or(env_map, "GATE_LEVEL1_REQUIRED", 2i64)?;
        let gate_level2_required = parse_or(env_map, "GATE_LEVEL2_REQUIRED", 4i64)?;
        let global_deposit_goal = parse_decimal_or(env_map, "GLOBAL_DEPOSIT_GOAL", "10000")?;
        let global_wallet_goal = parse_or(env_map, "GLOBAL_WALLET_GOAL", 10_000i64)?;

        let tiers = TierTable {
            starter: TierSpec {
                principal: parse_decimal_or(env_map, "STARTER_PRINCIPAL", "50")?,
                daily_percent: parse_decimal_or(env_map, "STARTER_DAILY_PERCENT", "0.45")?,
                yield_goal: parse_decimal_or(env_map, "STARTER_YIELD_GOAL", "50")?,
            },
            premium_principal: parse_decimal_or(env_map, "PREMIUM_PRINCIPAL", "100")?,
            premium_yield_goal: parse_decimal_or(env_map, "PREMIUM_YIELD_GOAL", "100")?,
            premium_daily_percents: parse_decimal_list(
                env_map
                    .get("PREMIUM_DAILY_PERCENTS")
                    .map(|s| s.as_str())
                    .unwrap_or("0.7758,0.65,0.55"),
                "PREMIUM_DAILY_PERCENTS",
            )?,
        };

        if tiers.premium_daily_percents.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PREMIUM_DAILY_PERCENTS".to_string(),
                "must list at least one rate".to_string(),
            ));
        }

        Ok(Policy {
            tax_percent,
            min_withdrawal_net,
            referral_level_percents,
            gate_enabled,
            gate_level1_required,
            gate_level2_required,
            global_deposit_goal,
            global_wallet_goal,
            tiers,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("could not parse {:?}", raw),
            )
        }),
    }
}

fn parse_decimal_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str_canonical(raw)
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("could not parse {:?}", raw)))
}

fn parse_decimal_list(raw: &str, key: &str) -> Result<Vec<Decimal>, ConfigError> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            Decimal::from_str_canonical(s).map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), format!("could not parse {:?}", s))
            })
        })
        .collect()
}

fn parse_level_percents(raw: Option<&str>) -> Result<[Decimal; REFERRAL_LEVELS], ConfigError> {
    let values = parse_decimal_list(raw.unwrap_or("10,5,1,1,1"), "REFERRAL_LEVEL_PERCENTS")?;
    if values.len() != REFERRAL_LEVELS {
        return Err(ConfigError::InvalidValue(
            "REFERRAL_LEVEL_PERCENTS".to_string(),
            format!("expected {} percentages, got {}", REFERRAL_LEVELS, values.len()),
        ));
    }
    let mut percents = [Decimal::zero(); REFERRAL_LEVELS];
    percents.copy_from_slice(&values);
    Ok(percents)
}
