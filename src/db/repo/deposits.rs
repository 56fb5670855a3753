//! Deposit rows, keyed by unique tx hash.

use crate::db::repo::{decode_err, from_ms, from_opt_ms, parse_money, to_ms};
use crate::domain::{Decimal, Deposit, DepositStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;

fn map_deposit(row: &SqliteRow) -> Result<Deposit, sqlx::Error> {
    let status = DepositStatus::from_str(&row.get::<String, _>("status")).map_err(decode_err)?;
    Ok(Deposit {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: parse_money("amount", &row.get::<String, _>("amount")),
        tx_hash: row.get("tx_hash"),
        block_number: row.get("block_number"),
        status,
        created_at: from_ms(row.get("created_at")),
        confirmed_at: from_opt_ms(row.get("confirmed_at")),
    })
}

pub async fn find_by_tx_hash(
    conn: &mut SqliteConnection,
    tx_hash: &str,
) -> Result<Option<Deposit>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM deposits WHERE tx_hash = ?")
        .bind(tx_hash)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_deposit).transpose()
}

/// Insert a confirmed deposit idempotently.
///
/// Returns None when the tx hash already exists (no row written), so a
/// re-delivered confirmation is a detectable no-op.
pub async fn insert_confirmed(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: Decimal,
    tx_hash: &str,
    block_number: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Option<Deposit>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO deposits (account_id, amount, tx_hash, block_number, status, created_at, confirmed_at)
        VALUES (?, ?, ?, ?, 'confirmed', ?, ?)
        ON CONFLICT(tx_hash) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(amount.to_canonical_string())
    .bind(tx_hash)
    .bind(block_number)
    .bind(to_ms(now))
    .bind(to_ms(now))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let id = result.last_insert_rowid();
    let row = sqlx::query("SELECT * FROM deposits WHERE id = ?")
        .bind(id)
        .fetch_one(conn)
        .await?;
    map_deposit(&row).map(Some)
}

pub async fn list_for_account(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Vec<Deposit>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM deposits WHERE account_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(map_deposit).collect()
}
