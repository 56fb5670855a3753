use axum::http::StatusCode;
use serde_json::{json, Value};
use stakewell::api::{self, AppState};
use stakewell::config::Policy;
use stakewell::db::init_db;
use stakewell::engine::{DepositEngine, PositionEngine, WithdrawalEngine};
use stakewell::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const WALLET: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

fn test_policy() -> Policy {
    let mut env = HashMap::new();
    env.insert("WITHDRAWAL_GATE_ENABLED".to_string(), "false".to_string());
    Policy::from_env_map(&env).expect("policy")
}

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let policy = test_policy();
    let deposits = Arc::new(DepositEngine::new(repo.clone(), policy.clone()));
    let positions = Arc::new(PositionEngine::new(repo.clone(), policy.clone()));
    let withdrawals = Arc::new(WithdrawalEngine::new(repo.clone(), policy));
    let state = AppState::new(repo, deposits, positions, withdrawals);

    (api::create_router(state), temp_dir)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn deposit_body(wallet: &str, amount: &str, tx_hash: &str) -> Value {
    json!({
        "wallet": wallet,
        "amount": amount,
        "txHash": tx_hash,
        "blockNumber": 1,
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _temp) = setup_test_app().await;
    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_deposit_roundtrip() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body(WALLET, "100", "0xabc1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], true);
    assert_eq!(body["isNewAccount"], true);
    assert_eq!(body["isFirstDeposit"], true);
    assert_eq!(body["availableBalance"], "100");

    // Same tx hash again: benign duplicate, no second credit.
    let (status, body) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body(WALLET, "100", "0xabc1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], false);

    let (status, body) = send(&app, "GET", &format!("/v1/accounts/{}", WALLET), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availableBalance"], "100");
    assert_eq!(body["totalDeposited"], "100");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1/accounts/{}/deposits", WALLET),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deposits"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_wallet_is_bad_request() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body("not-a-wallet", "100", "0xabc2")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("address"));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let (app, _temp) = setup_test_app().await;
    let (status, _body) = send(&app, "GET", &format!("/v1/accounts/{}", WALLET), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_open_position_and_list() {
    let (app, _temp) = setup_test_app().await;

    send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body(WALLET, "100", "0xabc3")),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/positions",
        Some(json!({"wallet": WALLET, "tier": "premium"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["currentValue"], "100");
    assert_eq!(body["dailyPercent"], "0.7758");
    assert_eq!(body["daysRemaining"], 90);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1/accounts/{}/positions", WALLET),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeCount"], 1);
    assert_eq!(body["totalValue"], "100");

    // A second stake without funds is an actionable failure.
    let (status, body) = send(
        &app,
        "POST",
        "/v1/positions",
        Some(json!({"wallet": WALLET, "tier": "premium"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["available"], 0.0);
    assert_eq!(body["required"], 100.0);
}

#[tokio::test]
async fn test_withdrawal_quote_and_create() {
    let (app, _temp) = setup_test_app().await;

    send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body(WALLET, "100", "0xabc4")),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1/withdrawals/quote?wallet={}&kind=personal", WALLET),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["grossAmount"], "100");
    assert_eq!(body["taxAmount"], "12");
    assert_eq!(body["netAmount"], "88");
    assert_eq!(body["canWithdraw"], true);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/withdrawals",
        Some(json!({"wallet": WALLET, "kind": "personal"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["netAmount"], "88");
    let withdrawal_id = body["id"].as_i64().unwrap();

    let (status, body) = send(&app, "GET", "/v1/admin/withdrawals/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/admin/withdrawals/{}/approve", withdrawal_id),
        Some(json!({"txHash": "0xsettle"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    // Terminal transitions conflict.
    let (status, _body) = send(
        &app,
        "POST",
        &format!("/v1/admin/withdrawals/{}/reject", withdrawal_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_stats_and_manual_sweep() {
    let (app, _temp) = setup_test_app().await;

    send(
        &app,
        "POST",
        "/v1/deposits",
        Some(deposit_body(WALLET, "100", "0xabc5")),
    )
    .await;
    send(
        &app,
        "POST",
        "/v1/positions",
        Some(json!({"wallet": WALLET, "tier": "premium"})),
    )
    .await;

    let (status, body) = send(&app, "POST", "/v1/admin/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["stillActive"], 1);

    let (status, body) = send(&app, "GET", "/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalDeposits"], "100");
    assert_eq!(body["totalUsers"], 1);
    assert_eq!(body["payingUsers"], 1);
    assert_eq!(body["activePositions"], 1);
    assert!(body["lastSweepAt"].is_i64());
}
