//! Account rows: lookup, creation, and balance persistence.

use crate::db::repo::{from_ms, parse_money, to_ms};
use crate::domain::{Account, Address, REFERRAL_LEVELS};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn map_account(row: &SqliteRow) -> Account {
    let mut level_referrals = [0i64; REFERRAL_LEVELS];
    for (i, slot) in level_referrals.iter_mut().enumerate() {
        *slot = row.get::<i64, _>(format!("level{}_referrals", i + 1).as_str());
    }

    Account {
        id: row.get("id"),
        wallet_address: Address::new(row.get::<String, _>("wallet_address")),
        referrer_address: row
            .get::<Option<String>, _>("referrer_address")
            .map(Address::new),
        available_balance: parse_money(
            "available_balance",
            &row.get::<String, _>("available_balance"),
        ),
        referral_balance: parse_money(
            "referral_balance",
            &row.get::<String, _>("referral_balance"),
        ),
        locked_profits: parse_money("locked_profits", &row.get::<String, _>("locked_profits")),
        total_deposited: parse_money(
            "total_deposited",
            &row.get::<String, _>("total_deposited"),
        ),
        total_referral_earned: parse_money(
            "total_referral_earned",
            &row.get::<String, _>("total_referral_earned"),
        ),
        total_withdrawn: parse_money(
            "total_withdrawn",
            &row.get::<String, _>("total_withdrawn"),
        ),
        level_referrals,
        has_used_starter: row.get::<i64, _>("has_used_starter") != 0,
        premium_count: row.get("premium_count"),
        created_at: from_ms(row.get("created_at")),
        updated_at: from_ms(row.get("updated_at")),
    }
}

pub async fn find_by_wallet(
    conn: &mut SqliteConnection,
    wallet: &Address,
) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM accounts WHERE wallet_address = ?")
        .bind(wallet.as_str())
        .fetch_optional(conn)
        .await?;

    Ok(row.as_ref().map(map_account))
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    account_id: i64,
) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.as_ref().map(map_account))
}

/// Insert a fresh account with zeroed buckets.
///
/// The wallet's UNIQUE constraint is the last line of defense against a
/// duplicate; callers pre-check and map violations to DuplicateAccount.
pub async fn insert(
    conn: &mut SqliteConnection,
    wallet: &Address,
    referrer: Option<&Address>,
    now: DateTime<Utc>,
) -> Result<Account, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts (wallet_address, referrer_address, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(wallet.as_str())
    .bind(referrer.map(|r| r.as_str()))
    .bind(to_ms(now))
    .bind(to_ms(now))
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    find_by_id(conn, id)
        .await?
        .ok_or_else(|| sqlx::Error::RowNotFound)
}

/// Persist every mutable field of an account in one statement.
pub async fn store(
    conn: &mut SqliteConnection,
    account: &Account,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE accounts SET
            available_balance = ?,
            referral_balance = ?,
            locked_profits = ?,
            total_deposited = ?,
            total_referral_earned = ?,
            total_withdrawn = ?,
            level1_referrals = ?,
            level2_referrals = ?,
            level3_referrals = ?,
            level4_referrals = ?,
            level5_referrals = ?,
            has_used_starter = ?,
            premium_count = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(account.available_balance.to_canonical_string())
    .bind(account.referral_balance.to_canonical_string())
    .bind(account.locked_profits.to_canonical_string())
    .bind(account.total_deposited.to_canonical_string())
    .bind(account.total_referral_earned.to_canonical_string())
    .bind(account.total_withdrawn.to_canonical_string())
    .bind(account.level_referrals[0])
    .bind(account.level_referrals[1])
    .bind(account.level_referrals[2])
    .bind(account.level_referrals[3])
    .bind(account.level_referrals[4])
    .bind(account.has_used_starter as i64)
    .bind(account.premium_count)
    .bind(to_ms(now))
    .bind(account.id)
    .execute(conn)
    .await?;

    Ok(())
}
