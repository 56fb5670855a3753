use stakewell::config::Policy;
use stakewell::db::init_db;
use stakewell::db::repo::{accounts, counters};
use stakewell::engine::{
    ledger, DepositEngine, DepositRequest, PositionEngine,
};
use stakewell::error::CoreError;
use stakewell::{Address, Decimal, PositionStatus, PositionTier, Repository};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn test_policy() -> Policy {
    Policy::from_env_map(&HashMap::new()).expect("default policy")
}

fn wallet(n: u8) -> Address {
    Address::new(format!("0x{:040x}", n))
}

struct Harness {
    repo: Arc<Repository>,
    deposits: Arc<DepositEngine>,
    positions: Arc<PositionEngine>,
    _temp: TempDir,
}

async fn setup() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    Harness {
        deposits: Arc::new(DepositEngine::new(repo.clone(), test_policy())),
        positions: Arc::new(PositionEngine::new(repo.clone(), test_policy())),
        repo,
        _temp: temp_dir,
    }
}

async fn fund(h: &Harness, wallet: &Address, amount: &str, tx_hash: &str) {
    h.deposits
        .ingest(DepositRequest {
            wallet: wallet.clone(),
            amount: Decimal::from_str_canonical(amount).unwrap(),
            tx_hash: tx_hash.to_string(),
            block_number: None,
            referrer: None,
        })
        .await
        .expect("funding deposit failed");
}

#[tokio::test]
async fn open_premium_debits_and_activates() {
    let h = setup().await;
    let w = wallet(1);
    fund(&h, &w, "100", "0x1").await;

    let position = h
        .positions
        .open_position(&w, PositionTier::Premium)
        .await
        .expect("open failed");

    assert_eq!(position.status, PositionStatus::Active);
    assert_eq!(position.principal, Decimal::from_i64(100));
    assert_eq!(position.current_value, Decimal::from_i64(100));
    assert_eq!(position.yield_earned, Decimal::zero());
    assert_eq!(
        position.daily_percent,
        Decimal::from_str_canonical("0.7758").unwrap()
    );
    assert_eq!(position.yield_goal, Decimal::from_i64(100));

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::zero());
    assert_eq!(account.premium_count, 1);
}

#[tokio::test]
async fn premium_rate_steps_down_per_position() {
    let h = setup().await;
    let w = wallet(2);
    fund(&h, &w, "300", "0x2").await;

    let first = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();
    let second = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();
    let third = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();

    assert_eq!(first.daily_percent, Decimal::from_str_canonical("0.7758").unwrap());
    assert_eq!(second.daily_percent, Decimal::from_str_canonical("0.65").unwrap());
    assert_eq!(third.daily_percent, Decimal::from_str_canonical("0.55").unwrap());
}

#[tokio::test]
async fn starter_is_one_time_only() {
    let h = setup().await;
    let w = wallet(3);
    fund(&h, &w, "100", "0x3").await;

    let starter = h
        .positions
        .open_position(&w, PositionTier::Starter)
        .await
        .expect("starter open failed");
    assert_eq!(starter.principal, Decimal::from_i64(50));
    assert_eq!(
        starter.daily_percent,
        Decimal::from_str_canonical("0.45").unwrap()
    );
    assert_eq!(starter.yield_goal, Decimal::from_i64(50));

    let err = h
        .positions
        .open_position(&w, PositionTier::Starter)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StarterAlreadyUsed));
}

#[tokio::test]
async fn insufficient_funds_leaves_state_unchanged() {
    let h = setup().await;
    let w = wallet(4);
    fund(&h, &w, "40", "0x4").await;

    let err = h
        .positions
        .open_position(&w, PositionTier::Premium)
        .await
        .unwrap_err();
    match err {
        CoreError::InsufficientFunds {
            available,
            required,
        } => {
            assert_eq!(available, Decimal::from_i64(40));
            assert_eq!(required, Decimal::from_i64(100));
        }
        other => panic!("expected InsufficientFunds, got {other}"),
    }

    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.available_balance, Decimal::from_i64(40));
}

#[tokio::test]
async fn stake_debit_spends_referral_balance_first() {
    let h = setup().await;
    let w = wallet(5);
    fund(&h, &w, "60", "0x5").await;

    {
        let mut tx = h.repo.begin().await.unwrap();
        let account = accounts::find_by_wallet(&mut tx, &w).await.unwrap().unwrap();
        ledger::add_referral_earning(&mut tx, account.id, Decimal::from_i64(50), 1)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    h.positions
        .open_position(&w, PositionTier::Premium)
        .await
        .expect("open failed");

    // Bonus money went first: 50 referral + 50 of the 60 available.
    let mut conn = h.repo.acquire().await.unwrap();
    let account = accounts::find_by_wallet(&mut conn, &w).await.unwrap().unwrap();
    assert_eq!(account.referral_balance, Decimal::zero());
    assert_eq!(account.available_balance, Decimal::from_i64(10));
}

#[tokio::test]
async fn daily_yield_compounds_and_unlocks_at_goal() {
    let h = setup().await;
    let w = wallet(6);
    fund(&h, &w, "100", "0x6").await;
    let position = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();

    let after_one = h.positions.apply_daily_yield(position.id).await.unwrap();
    assert_eq!(
        after_one.current_value,
        Decimal::from_str_canonical("100.7758").unwrap()
    );
    assert!(after_one.last_yield_applied_at.is_some());

    // ceil(ln(200/100) / ln(1.007758)) = 90: day 89 is still short of
    // the goal, day 90 crosses it.
    let mut current = after_one;
    for _ in 1..89 {
        current = h.positions.apply_daily_yield(position.id).await.unwrap();
        assert_eq!(current.status, PositionStatus::Active);
    }
    assert!(current.yield_earned < current.yield_goal);

    let unlocked = h.positions.apply_daily_yield(position.id).await.unwrap();
    assert_eq!(unlocked.status, PositionStatus::Unlocked);
    assert!(unlocked.yield_earned >= unlocked.yield_goal);
    assert!(unlocked.unlocked_at.is_some());
    assert!(unlocked.current_value >= Decimal::from_i64(200));
}

#[tokio::test]
async fn yield_on_non_active_position_is_rejected() {
    let h = setup().await;
    let w = wallet(7);
    fund(&h, &w, "100", "0x7").await;
    let position = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();

    for _ in 0..90 {
        h.positions.apply_daily_yield(position.id).await.unwrap();
    }

    let err = h.positions.apply_daily_yield(position.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotActive));

    let err = h.positions.apply_daily_yield(999_999).await.unwrap_err();
    assert!(matches!(err, CoreError::PositionNotFound(_)));
}

#[tokio::test]
async fn sweep_processes_every_active_position() {
    let h = setup().await;

    for n in 10..13 {
        let w = wallet(n);
        fund(&h, &w, "100", &format!("0x1{}", n)).await;
        h.positions.open_position(&w, PositionTier::Premium).await.unwrap();
    }

    let report = h.positions.run_daily_sweep().await.expect("sweep failed");
    assert_eq!(report.processed, 3);
    assert_eq!(report.still_active, 3);
    assert_eq!(report.unlocked, 0);
    assert_eq!(report.failed, 0);

    let mut conn = h.repo.acquire().await.unwrap();
    let stats = counters::get(&mut conn).await.unwrap();
    assert!(stats.last_sweep_at.is_some());
}

#[tokio::test]
async fn sweep_counts_fresh_unlocks() {
    let h = setup().await;
    let w = wallet(20);
    fund(&h, &w, "100", "0x20").await;
    let position = h.positions.open_position(&w, PositionTier::Premium).await.unwrap();

    // Walk to the brink by hand, then let the sweep cross the goal.
    for _ in 0..89 {
        h.positions.apply_daily_yield(position.id).await.unwrap();
    }

    let report = h.positions.run_daily_sweep().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.unlocked, 1);
    assert_eq!(report.still_active, 0);
}

#[tokio::test]
async fn unknown_account_cannot_stake() {
    let h = setup().await;
    let err = h
        .positions
        .open_position(&wallet(99), PositionTier::Premium)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AccountNotFound(_)));
}
