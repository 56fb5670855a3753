//! Referral Engine: upline resolution and exactly-once commissions.

use crate::config::Policy;
use crate::db::repo::{accounts, referrals};
use crate::domain::{Account, Address, Decimal, ReferralAward, REFERRAL_LEVELS};
use crate::engine::ledger;
use crate::error::CoreError;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Walk `referrer_address` pointers from `wallet`'s own referrer
/// upward, direct referrer first.
///
/// Stops at the first missing link or after `max_levels` hops; the
/// bound doubles as the cycle defense, so a corrupt self-referencing
/// chain terminates.
pub async fn resolve_upline_chain(
    conn: &mut SqliteConnection,
    wallet: &Address,
    max_levels: usize,
) -> Result<Vec<Account>, sqlx::Error> {
    let Some(start) = accounts::find_by_wallet(conn, wallet).await? else {
        return Ok(Vec::new());
    };

    let mut chain = Vec::new();
    let mut next = start.referrer_address;
    while chain.len() < max_levels {
        let Some(referrer_addr) = next else { break };
        let Some(referrer) = accounts::find_by_wallet(conn, &referrer_addr).await? else {
            break;
        };
        next = referrer.referrer_address.clone();
        chain.push(referrer);
    }

    Ok(chain)
}

/// Pay multi-level commissions for one deposit, exactly once.
///
/// The unique award key makes re-runs safe: an existing row is skipped
/// together with its balance credit, so retried confirmations and
/// retroactive fix-ups can never double-pay.
pub async fn award_for_deposit(
    conn: &mut SqliteConnection,
    depositor: &Account,
    deposit_id: i64,
    deposit_amount: Decimal,
    policy: &Policy,
) -> Result<Vec<ReferralAward>, CoreError> {
    let chain =
        resolve_upline_chain(conn, &depositor.wallet_address, REFERRAL_LEVELS).await?;

    let mut awards = Vec::with_capacity(chain.len());
    for (i, referrer) in chain.iter().enumerate() {
        let level = (i + 1) as u8;
        let percentage = policy.referral_level_percents[i];
        let reward = percentage.percent_of(deposit_amount);

        let inserted = referrals::insert_award(
            conn,
            referrer.id,
            depositor.id,
            deposit_id,
            level,
            percentage,
            reward,
            Utc::now(),
        )
        .await?;

        match inserted {
            Some(award) => {
                ledger::add_referral_earning(conn, referrer.id, reward, level).await?;
                info!(
                    level,
                    beneficiary = %referrer.wallet_address,
                    amount = %reward,
                    deposit_id,
                    "referral commission awarded"
                );
                awards.push(award);
            }
            None => {
                debug!(
                    level,
                    beneficiary = %referrer.wallet_address,
                    deposit_id,
                    "referral award already attributed, skipping"
                );
            }
        }
    }

    Ok(awards)
}
