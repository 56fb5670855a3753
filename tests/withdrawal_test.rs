use stakewell::config::Policy;
use stakewell::db::init_db;
use stakewell::db::repo::{accounts, positions as position_rows, withdrawals as withdrawal_rows};
use stakewell::engine::{DepositEngine, DepositRequest, PositionEngine, WithdrawalEngine};
use stakewell::error::CoreError;
use stakewell::{
    Address, Decimal, PositionStatus, PositionTier, Repository, WithdrawalKind, WithdrawalStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn gateless_policy() -> Policy {
    let mut env = HashMap::new();
    env.insert("WITHDRAWAL_GATE_ENABLED".to_string(), "false".to_string());
    Policy::from_env_map(&env).expect("policy")
}

fn gated_policy() -> Policy {
    Policy::from_env_map(&HashMap::new()).expect("policy")
}

fn wallet(n: u8) -> Address {
    Address::new(format!("0x{:040x}", n))
}

struct Harness {
    repo: Arc<Repository>,
    deposits: Arc<DepositEngine>,
    positions: Arc<PositionEngine>,
    withdrawals: Arc<WithdrawalEngine>,
    _temp: TempDir,
}

async fn setup_with(policy: Policy) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    Harness {
        deposits: Arc::new(DepositEngine::new(repo.clone(), policy.clone())),
        positions: Arc::new(PositionEngine::new(repo.clone(), policy.clone())),
        withdrawals: Arc::new(WithdrawalEngine::new(repo.clone(), policy)),
        repo,
        _temp: temp_dir,
    }
}

async fn fund(h: &Harness, wallet: &Address, amount: &str, tx_hash: &str, referrer: Option<&Address>) {
    h.deposits
        .ingest(DepositRequest {
            wallet: wallet.clone(),
            amount: Decimal::from_str_canonical(amount).unwrap(),
            tx_hash: tx_hash.to_string(),
            block_number: None,
            referrer: referrer.cloned(),
        })
        .await
        .expect("funding deposit failed");
}

#[tokio::test]
async fn personal_quote_taxes_twelve_percent() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(1);
    fund(&h, &w, "100", "0x1", None).await;

    let quote = h
        .withdrawals
        .compute_withdrawable(&w, WithdrawalKind::Personal)
        .await
        .unwrap();

    assert_eq!(quote.gross_amount, Decimal::from_i64(100));
    assert_eq!(quote.tax_amount, Decimal::from_i64(12));
    assert_eq!(quote.net_amount, Decimal::from_i64(88));
    assert!(quote.can_withdraw);
    assert_eq!(
        quote.gross_amount,
        quote.tax_amount + quote.net_amount,
        "tax identity must hold exactly"
    );
}

#[tokio::test]
async fn tax_identity_holds_on_awkward_amounts() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(2);
    fund(&h, &w, "123.45", "0x2", None).await;

    let quote = h
        .withdrawals
        .compute_withdrawable(&w, WithdrawalKind::Personal)
        .await
        .unwrap();

    // 12% of 123.45 is 14.814, rounded to cents.
    assert_eq!(quote.tax_amount, Decimal::from_str_canonical("14.81").unwrap());
    assert_eq!(quote.gross_amount, quote.tax_amount + quote.net_amount);
}

#[tokio::test]
async fn personal_withdrawal_sweeps_all_buckets() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(3);
    fund(&h, &w, "200", "0x3", None).await;

    // Ride one position to unlock so the sweep covers every source.
    let position = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();
    for _ in 0..90 {
        h.positions.apply_daily_yield(position.id).await.unwrap();
    }

    let quote = h
        .withdrawals
        .compute_withdrawable(&w, WithdrawalKind::Personal)
        .await
        .unwrap();
    let breakdown = quote.breakdown.as_ref().expect("personal breakdown");
    assert_eq!(breakdown.available_balance, Decimal::from_i64(100));
    assert!(breakdown.unlocked_positions > Decimal::from_i64(200));

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .expect("create failed");

    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(withdrawal.kind, WithdrawalKind::Personal);
    assert_eq!(withdrawal.gross_amount, quote.gross_amount);
    assert_eq!(
        withdrawal.gross_amount,
        withdrawal.tax_amount + withdrawal.net_amount
    );

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::zero());
    assert_eq!(account.locked_profits, Decimal::zero());
    assert_eq!(account.total_withdrawn, withdrawal.net_amount);

    let position = position_rows::by_id(&mut conn, position.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.status, PositionStatus::Withdrawn);
}

#[tokio::test]
async fn referral_withdrawal_touches_only_referral_balance() {
    let h = setup_with(gateless_policy()).await;
    let upline = wallet(4);
    let downline = wallet(5);

    fund(&h, &upline, "100", "0x4", None).await;
    // A 600 deposit pays the upline 60 at level 1.
    fund(&h, &downline, "600", "0x5", Some(&upline)).await;

    let quote = h
        .withdrawals
        .compute_withdrawable(&upline, WithdrawalKind::Referral)
        .await
        .unwrap();
    assert_eq!(quote.gross_amount, Decimal::from_i64(60));
    assert!(quote.breakdown.is_none());

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&upline, WithdrawalKind::Referral)
        .await
        .expect("create failed");
    assert_eq!(withdrawal.net_amount, Decimal::from_str_canonical("52.8").unwrap());

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &upline).await.unwrap().unwrap();
    assert_eq!(account.referral_balance, Decimal::zero());
    // The personal bucket is untouched by a referral withdrawal.
    assert_eq!(account.available_balance, Decimal::from_i64(100));
    assert_eq!(account.total_withdrawn, withdrawal.net_amount);
}

#[tokio::test]
async fn empty_account_has_no_funds() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(6);
    fund(&h, &w, "100", "0x6", None).await;
    h.positions.open_position(&w, PositionTier::Premium).await.unwrap();

    // Everything is staked and still locked.
    let err = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoFunds));
}

#[tokio::test]
async fn below_minimum_net_is_rejected_without_mutation() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(7);
    fund(&h, &w, "50", "0x7", None).await;

    // Net 44 is under the 50 floor.
    let err = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap_err();
    match err {
        CoreError::BelowMinimum { net, minimum } => {
            assert_eq!(net, Decimal::from_i64(44));
            assert_eq!(minimum, Decimal::from_i64(50));
        }
        other => panic!("expected BelowMinimum, got {other}"),
    }

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::from_i64(50));
    assert!(withdrawal_rows::list_for_account(&mut conn, account.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn gate_rejects_with_actual_counts_and_no_mutation() {
    let h = setup_with(gated_policy()).await;
    let w = wallet(8);
    let ref1 = wallet(9);

    fund(&h, &w, "100", "0x8", None).await;
    // One direct referral with an active premium stake: 1 of 2
    // required at level 1, 0 of 4 at level 2.
    fund(&h, &ref1, "100", "0x9", Some(&w)).await;
    h.positions.open_position(&ref1, PositionTier::Premium).await.unwrap();

    let err = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap_err();
    match err {
        CoreError::NotEligible {
            level1,
            level1_required,
            level2,
            level2_required,
        } => {
            assert_eq!(level1, 1);
            assert_eq!(level1_required, 2);
            assert_eq!(level2, 0);
            assert_eq!(level2_required, 4);
        }
        other => panic!("expected NotEligible, got {other}"),
    }

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::from_i64(100));
    assert!(withdrawal_rows::list_for_account(&mut conn, account.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn gate_passes_with_enough_active_premium_downline() {
    let h = setup_with(gated_policy()).await;
    let w = wallet(10);
    fund(&h, &w, "100", "0xa0", None).await;

    // Two level-1 referrals, each with two level-2 referrals below
    // them; every downline account holds an active premium stake.
    let mut n = 11u8;
    for _ in 0..2 {
        let l1 = wallet(n);
        n += 1;
        fund(&h, &l1, "100", &format!("0xa{}", n), Some(&w)).await;
        h.positions.open_position(&l1, PositionTier::Premium).await.unwrap();

        for _ in 0..2 {
            let l2 = wallet(n);
            n += 1;
            fund(&h, &l2, "100", &format!("0xa{}", n), Some(&l1)).await;
            h.positions.open_position(&l2, PositionTier::Premium).await.unwrap();
        }
    }

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .expect("gate should pass with 2 L1 and 4 L2");
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
}

#[tokio::test]
async fn approve_completes_pending_exactly_once() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(20);
    fund(&h, &w, "100", "0xb0", None).await;

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap();

    let approved = h
        .withdrawals
        .approve(withdrawal.id, "0xsettled")
        .await
        .expect("approve failed");
    assert_eq!(approved.status, WithdrawalStatus::Completed);
    assert_eq!(approved.tx_hash.as_deref(), Some("0xsettled"));
    assert!(approved.completed_at.is_some());

    let err = h.withdrawals.approve(withdrawal.id, "0xagain").await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyProcessed));

    let err = h.withdrawals.approve(777_777, "0x").await.unwrap_err();
    assert!(matches!(err, CoreError::WithdrawalNotFound(_)));
}

#[tokio::test]
async fn reject_refunds_gross_atomically() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(21);
    fund(&h, &w, "100", "0xc0", None).await;

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap();
    assert_eq!(withdrawal.gross_amount, Decimal::from_i64(100));

    let rejected = h.withdrawals.reject(withdrawal.id).await.expect("reject failed");
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    // The swept gross is back in the available bucket.
    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::from_i64(100));

    let err = h.withdrawals.reject(withdrawal.id).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyProcessed));
}

#[tokio::test]
async fn pending_listing_and_history() {
    let h = setup_with(gateless_policy()).await;
    let w = wallet(22);
    fund(&h, &w, "100", "0xd0", None).await;

    let withdrawal = h
        .withdrawals
        .create_withdrawal(&w, WithdrawalKind::Personal)
        .await
        .unwrap();

    let pending = h.withdrawals.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, withdrawal.id);

    h.withdrawals.approve(withdrawal.id, "0xdone").await.unwrap();
    assert!(h.withdrawals.pending().await.unwrap().is_empty());

    let history = h.withdrawals.history(&w).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, WithdrawalStatus::Completed);
}
