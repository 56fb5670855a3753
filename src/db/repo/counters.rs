//! The global counters row.

use crate::config::Policy;
use crate::db::repo::{from_opt_ms, parse_money, to_ms};
use crate::domain::{Decimal, GlobalCounters};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use tracing::info;

pub async fn get(conn: &mut SqliteConnection) -> Result<GlobalCounters, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM global_counters WHERE id = 1")
        .fetch_one(conn)
        .await?;

    Ok(GlobalCounters {
        total_deposits: parse_money("total_deposits", &row.get::<String, _>("total_deposits")),
        total_users: row.get("total_users"),
        paying_users: row.get("paying_users"),
        withdrawals_unlocked: row.get::<i64, _>("withdrawals_unlocked") != 0,
        unlock_date: from_opt_ms(row.get("unlock_date")),
        last_sweep_at: from_opt_ms(row.get("last_sweep_at")),
    })
}

/// Fold one deposit into the aggregates. `is_first` is computed by the
/// caller from the pre-credit account state, exactly once.
pub async fn record_deposit(
    conn: &mut SqliteConnection,
    amount: Decimal,
    is_first: bool,
) -> Result<(), sqlx::Error> {
    let counters = get(conn).await?;
    let total = counters.total_deposits + amount;
    let paying = counters.paying_users + i64::from(is_first);

    sqlx::query("UPDATE global_counters SET total_deposits = ?, paying_users = ? WHERE id = 1")
        .bind(total.to_canonical_string())
        .bind(paying)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn increment_users(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE global_counters SET total_users = total_users + 1 WHERE id = 1")
        .execute(conn)
        .await?;

    Ok(())
}

/// Flip the platform-wide withdrawal unlock once both goals are met.
/// Returns whether withdrawals are unlocked after the check.
pub async fn check_and_unlock(
    conn: &mut SqliteConnection,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let counters = get(&mut *conn).await?;
    if counters.withdrawals_unlocked {
        return Ok(true);
    }

    if counters.total_deposits >= policy.global_deposit_goal
        && counters.paying_users >= policy.global_wallet_goal
    {
        sqlx::query(
            "UPDATE global_counters SET withdrawals_unlocked = 1, unlock_date = ? WHERE id = 1",
        )
        .bind(to_ms(now))
        .execute(conn)
        .await?;
        info!(
            total_deposits = %counters.total_deposits,
            paying_users = counters.paying_users,
            "global withdrawal unlock goals reached"
        );
        return Ok(true);
    }

    Ok(false)
}

pub async fn stamp_sweep(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE global_counters SET last_sweep_at = ? WHERE id = 1")
        .bind(to_ms(now))
        .execute(conn)
        .await?;

    Ok(())
}
