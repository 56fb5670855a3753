//! Withdrawal request rows.

use crate::db::repo::{decode_err, from_ms, from_opt_ms, parse_money, to_ms};
use crate::domain::{Decimal, Withdrawal, WithdrawalKind, WithdrawalStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;

fn map_withdrawal(row: &SqliteRow) -> Result<Withdrawal, sqlx::Error> {
    let kind = WithdrawalKind::from_str(&row.get::<String, _>("kind")).map_err(decode_err)?;
    let status =
        WithdrawalStatus::from_str(&row.get::<String, _>("status")).map_err(decode_err)?;
    Ok(Withdrawal {
        id: row.get("id"),
        account_id: row.get("account_id"),
        kind,
        gross_amount: parse_money("gross_amount", &row.get::<String, _>("gross_amount")),
        tax_percent: parse_money("tax_percent", &row.get::<String, _>("tax_percent")),
        tax_amount: parse_money("tax_amount", &row.get::<String, _>("tax_amount")),
        net_amount: parse_money("net_amount", &row.get::<String, _>("net_amount")),
        tx_hash: row.get("tx_hash"),
        status,
        created_at: from_ms(row.get("created_at")),
        completed_at: from_opt_ms(row.get("completed_at")),
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_pending(
    conn: &mut SqliteConnection,
    account_id: i64,
    kind: WithdrawalKind,
    gross: Decimal,
    tax_percent: Decimal,
    tax: Decimal,
    net: Decimal,
    now: DateTime<Utc>,
) -> Result<Withdrawal, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO withdrawals (
            account_id, kind, gross_amount, tax_percent, tax_amount,
            net_amount, status, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(account_id)
    .bind(kind.as_str())
    .bind(gross.to_canonical_string())
    .bind(tax_percent.to_canonical_string())
    .bind(tax.to_canonical_string())
    .bind(net.to_canonical_string())
    .bind(to_ms(now))
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    by_id(conn, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn by_id(
    conn: &mut SqliteConnection,
    withdrawal_id: i64,
) -> Result<Option<Withdrawal>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM withdrawals WHERE id = ?")
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_withdrawal).transpose()
}

/// Complete a pending withdrawal; the status guard in the WHERE clause
/// makes the transition race-safe. Returns rows affected (0 means the
/// withdrawal was not pending).
pub async fn complete_pending(
    conn: &mut SqliteConnection,
    withdrawal_id: i64,
    tx_hash: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = 'completed', tx_hash = ?, completed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(tx_hash)
    .bind(to_ms(now))
    .bind(withdrawal_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Reject a pending withdrawal. Same guarded-transition shape as
/// completion.
pub async fn reject_pending(
    conn: &mut SqliteConnection,
    withdrawal_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = 'rejected', completed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(to_ms(now))
    .bind(withdrawal_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn list_pending(conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, sqlx::Error> {
    let rows =
        sqlx::query("SELECT * FROM withdrawals WHERE status = 'pending' ORDER BY created_at ASC")
            .fetch_all(conn)
            .await?;

    rows.iter().map(map_withdrawal).collect()
}

pub async fn list_for_account(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM withdrawals WHERE account_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(map_withdrawal).collect()
}
