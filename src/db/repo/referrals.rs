//! Referral award rows and downline queries.

use crate::db::repo::{from_ms, parse_money, to_ms};
use crate::domain::{Address, Decimal, LevelEarnings, ReferralAward};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn map_award(row: &SqliteRow) -> ReferralAward {
    ReferralAward {
        id: row.get("id"),
        beneficiary_account_id: row.get("beneficiary_account_id"),
        source_account_id: row.get("source_account_id"),
        deposit_id: row.get("deposit_id"),
        level: row.get::<i64, _>("level") as u8,
        percentage: parse_money("percentage", &row.get::<String, _>("percentage")),
        amount: parse_money("amount", &row.get::<String, _>("amount")),
        created_at: from_ms(row.get("created_at")),
    }
}

/// Insert an award exactly once per (beneficiary, source, deposit,
/// level).
///
/// Returns the new row, or None when the key already exists; the
/// caller must then skip the balance credit too.
#[allow(clippy::too_many_arguments)]
pub async fn insert_award(
    conn: &mut SqliteConnection,
    beneficiary_account_id: i64,
    source_account_id: i64,
    deposit_id: i64,
    level: u8,
    percentage: Decimal,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Option<ReferralAward>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO referral_awards (
            beneficiary_account_id, source_account_id, deposit_id, level,
            percentage, amount, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(beneficiary_account_id, source_account_id, deposit_id, level) DO NOTHING
        "#,
    )
    .bind(beneficiary_account_id)
    .bind(source_account_id)
    .bind(deposit_id)
    .bind(level as i64)
    .bind(percentage.to_canonical_string())
    .bind(amount.to_canonical_string())
    .bind(to_ms(now))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let id = result.last_insert_rowid();
    let row = sqlx::query("SELECT * FROM referral_awards WHERE id = ?")
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(Some(map_award(&row)))
}

pub async fn list_for_beneficiary(
    conn: &mut SqliteConnection,
    beneficiary_account_id: i64,
) -> Result<Vec<ReferralAward>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM referral_awards WHERE beneficiary_account_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(beneficiary_account_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.iter().map(map_award).collect())
}

/// Per-level earnings aggregate for an account.
pub async fn earnings_by_level(
    conn: &mut SqliteConnection,
    beneficiary_account_id: i64,
) -> Result<Vec<LevelEarnings>, sqlx::Error> {
    let awards = list_for_beneficiary(conn, beneficiary_account_id).await?;

    let mut by_level: Vec<LevelEarnings> = Vec::new();
    for award in awards {
        match by_level.iter_mut().find(|e| e.level == award.level) {
            Some(entry) => {
                entry.award_count += 1;
                entry.total += award.amount;
            }
            None => by_level.push(LevelEarnings {
                level: award.level,
                award_count: 1,
                total: award.amount,
            }),
        }
    }
    by_level.sort_by_key(|e| e.level);
    Ok(by_level)
}

/// Count distinct downline accounts at exactly `depth` levels below
/// `wallet` that hold an active premium position.
///
/// The walk is a bounded recursive CTE over `referrer_address`
/// pointers; `depth` never exceeds the referral level cap, so a cyclic
/// chain cannot recurse unboundedly.
pub async fn count_active_premium_downline(
    conn: &mut SqliteConnection,
    wallet: &Address,
    depth: i64,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        WITH RECURSIVE downline(id, wallet_address, depth) AS (
            SELECT id, wallet_address, 1
            FROM accounts
            WHERE referrer_address = ?
            UNION ALL
            SELECT a.id, a.wallet_address, d.depth + 1
            FROM accounts a
            JOIN downline d ON a.referrer_address = d.wallet_address
            WHERE d.depth < ?
        )
        SELECT COUNT(DISTINCT d.id) AS n
        FROM downline d
        JOIN positions p ON p.account_id = d.id
        WHERE d.depth = ? AND p.tier = 'premium' AND p.status = 'active'
        "#,
    )
    .bind(wallet.as_str())
    .bind(depth)
    .bind(depth)
    .fetch_one(conn)
    .await?;

    Ok(row.get("n"))
}
