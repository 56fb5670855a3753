//! Deposit ingestion: idempotent crediting plus referral attribution.

use crate::config::Policy;
use crate::db::repo::{accounts, counters, deposits, Repository};
use crate::domain::{
    normalize_tx_hash, Account, Address, Decimal, Deposit, ReferralAward,
};
use crate::engine::{ledger, referrals};
use crate::error::CoreError;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A confirmed funding event handed over by the chain observer.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub wallet: Address,
    pub amount: Decimal,
    pub tx_hash: String,
    pub block_number: Option<i64>,
    /// Only honored when the wallet is new; an existing account's
    /// referrer is immutable.
    pub referrer: Option<Address>,
}

/// Everything one processed deposit changed.
#[derive(Debug, Clone)]
pub struct ProcessedDeposit {
    pub deposit: Deposit,
    pub account: Account,
    pub awards: Vec<ReferralAward>,
    pub is_new_account: bool,
    pub is_first_deposit: bool,
}

/// Either the deposit was processed, or its tx hash had been seen
/// before and nothing changed.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Processed(Box<ProcessedDeposit>),
    Duplicate(Deposit),
}

pub struct DepositEngine {
    repo: Arc<Repository>,
    policy: Policy,
}

impl DepositEngine {
    pub fn new(repo: Arc<Repository>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    /// Ingest one deposit in a single transaction: dedup, account
    /// get-or-create, credit, global counters, referral awards.
    pub async fn ingest(&self, request: DepositRequest) -> Result<IngestOutcome, CoreError> {
        if !request.amount.is_positive() {
            return Err(CoreError::InvalidAmount);
        }
        let tx_hash = normalize_tx_hash(&request.tx_hash);

        let mut tx = self.repo.begin().await?;

        if let Some(existing) = deposits::find_by_tx_hash(&mut tx, &tx_hash).await? {
            info!(tx_hash = %tx_hash, "deposit already processed, skipping");
            return Ok(IngestOutcome::Duplicate(existing));
        }

        let (account, is_new_account) =
            match accounts::find_by_wallet(&mut tx, &request.wallet).await? {
                Some(account) => (account, false),
                None => {
                    if let Some(referrer) = &request.referrer {
                        if accounts::find_by_wallet(&mut tx, referrer).await?.is_none() {
                            return Err(CoreError::UnknownReferrer(referrer.to_string()));
                        }
                    }
                    let account = ledger::create_account(
                        &mut tx,
                        &request.wallet,
                        request.referrer.as_ref(),
                    )
                    .await?;
                    (account, true)
                }
            };

        // Decided once, before the credit mutates the account.
        let is_first_deposit = account.total_deposited.is_zero();

        let deposit = deposits::insert_confirmed(
            &mut tx,
            account.id,
            request.amount,
            &tx_hash,
            request.block_number,
            Utc::now(),
        )
        .await?;
        let Some(deposit) = deposit else {
            // Lost an insert race on the unique hash; treat like the
            // pre-check hit.
            let existing = deposits::find_by_tx_hash(&mut tx, &tx_hash)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            return Ok(IngestOutcome::Duplicate(existing));
        };

        let account = ledger::credit_deposit(&mut tx, account.id, request.amount).await?;

        if is_new_account {
            counters::increment_users(&mut tx).await?;
        }
        counters::record_deposit(&mut tx, request.amount, is_first_deposit).await?;
        counters::check_and_unlock(&mut tx, &self.policy, Utc::now()).await?;

        let awards = if account.referrer_address.is_some() {
            referrals::award_for_deposit(&mut tx, &account, deposit.id, request.amount, &self.policy)
                .await?
        } else {
            Vec::new()
        };

        // Reload: awards may have touched this row via a short chain.
        let account = accounts::find_by_id(&mut tx, account.id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(request.wallet.to_string()))?;

        tx.commit().await?;

        info!(
            wallet = %request.wallet,
            amount = %request.amount,
            tx_hash = %tx_hash,
            is_new_account,
            is_first_deposit,
            awards = awards.len(),
            "deposit processed"
        );
        Ok(IngestOutcome::Processed(Box::new(ProcessedDeposit {
            deposit,
            account,
            awards,
            is_new_account,
            is_first_deposit,
        })))
    }
}
