//! Position rows: stake lifecycle persistence.

use crate::config::TierSpec;
use crate::db::repo::{decode_err, from_ms, from_opt_ms, parse_money, to_ms};
use crate::domain::{Decimal, Position, PositionStatus, PositionTier};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;

fn map_position(row: &SqliteRow) -> Result<Position, sqlx::Error> {
    let tier = PositionTier::from_str(&row.get::<String, _>("tier")).map_err(decode_err)?;
    let status = PositionStatus::from_str(&row.get::<String, _>("status")).map_err(decode_err)?;
    Ok(Position {
        id: row.get("id"),
        account_id: row.get("account_id"),
        tier,
        principal: parse_money("principal", &row.get::<String, _>("principal")),
        current_value: parse_money("current_value", &row.get::<String, _>("current_value")),
        yield_earned: parse_money("yield_earned", &row.get::<String, _>("yield_earned")),
        daily_percent: parse_money("daily_percent", &row.get::<String, _>("daily_percent")),
        yield_goal: parse_money("yield_goal", &row.get::<String, _>("yield_goal")),
        status,
        created_at: from_ms(row.get("created_at")),
        unlocked_at: from_opt_ms(row.get("unlocked_at")),
        withdrawn_at: from_opt_ms(row.get("withdrawn_at")),
        last_yield_applied_at: from_opt_ms(row.get("last_yield_applied_at")),
    })
}

/// Insert a fresh active position at its tier economics.
pub async fn insert(
    conn: &mut SqliteConnection,
    account_id: i64,
    tier: PositionTier,
    spec: TierSpec,
    now: DateTime<Utc>,
) -> Result<Position, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO positions (
            account_id, tier, principal, current_value, yield_earned,
            daily_percent, yield_goal, status, created_at
        )
        VALUES (?, ?, ?, ?, '0', ?, ?, 'active', ?)
        "#,
    )
    .bind(account_id)
    .bind(tier.as_str())
    .bind(spec.principal.to_canonical_string())
    .bind(spec.principal.to_canonical_string())
    .bind(spec.daily_percent.to_canonical_string())
    .bind(spec.yield_goal.to_canonical_string())
    .bind(to_ms(now))
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    by_id(conn, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn by_id(
    conn: &mut SqliteConnection,
    position_id: i64,
) -> Result<Option<Position>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM positions WHERE id = ?")
        .bind(position_id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_position).transpose()
}

/// Persist the outcome of a yield application.
pub async fn store_yield(
    conn: &mut SqliteConnection,
    position: &Position,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE positions SET
            current_value = ?,
            yield_earned = ?,
            status = ?,
            unlocked_at = ?,
            last_yield_applied_at = ?
        WHERE id = ?
        "#,
    )
    .bind(position.current_value.to_canonical_string())
    .bind(position.yield_earned.to_canonical_string())
    .bind(position.status.as_str())
    .bind(position.unlocked_at.map(to_ms))
    .bind(position.last_yield_applied_at.map(to_ms))
    .bind(position.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Ids of every active position, the daily sweep's work list.
pub async fn active_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    let rows = sqlx::query("SELECT id FROM positions WHERE status = 'active' ORDER BY id ASC")
        .fetch_all(conn)
        .await?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

pub async fn list_for_account(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Vec<Position>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM positions WHERE account_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(map_position).collect()
}

pub async fn unlocked_for_account(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Vec<Position>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM positions WHERE account_id = ? AND status = 'unlocked' ORDER BY unlocked_at ASC",
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(map_position).collect()
}

/// Sum of unlocked position value for an account.
///
/// Summed in Rust over canonical strings; SQL SUM would coerce the TEXT
/// amounts to floats.
pub async fn unlocked_value(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let positions = unlocked_for_account(conn, account_id).await?;
    Ok(positions.iter().map(|p| p.current_value).sum())
}

pub async fn mark_withdrawn(
    conn: &mut SqliteConnection,
    position_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE positions SET status = 'withdrawn', withdrawn_at = ? WHERE id = ?")
        .bind(to_ms(now))
        .bind(position_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Retire every unlocked position of an account; returns how many.
pub async fn retire_unlocked(
    conn: &mut SqliteConnection,
    account_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE positions SET status = 'withdrawn', withdrawn_at = ? WHERE account_id = ? AND status = 'unlocked'",
    )
    .bind(to_ms(now))
    .bind(account_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Global position counts by status, for the stats surface.
pub async fn status_counts(
    conn: &mut SqliteConnection,
) -> Result<(i64, i64, i64), sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(CASE WHEN status = 'active' THEN 1 END) AS active,
            COUNT(CASE WHEN status = 'unlocked' THEN 1 END) AS unlocked,
            COUNT(CASE WHEN status = 'withdrawn' THEN 1 END) AS withdrawn
        FROM positions
        "#,
    )
    .fetch_one(conn)
    .await?;

    Ok((row.get("active"), row.get("unlocked"), row.get("withdrawn")))
}
