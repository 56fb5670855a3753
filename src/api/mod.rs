pub mod accounts;
pub mod admin;
pub mod deposits;
pub mod health;
pub mod positions;
pub mod stats;
pub mod withdrawals;

use crate::db::Repository;
use crate::engine::{DepositEngine, PositionEngine, WithdrawalEngine};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub deposits: Arc<DepositEngine>,
    pub positions: Arc<PositionEngine>,
    pub withdrawals: Arc<WithdrawalEngine>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        deposits: Arc<DepositEngine>,
        positions: Arc<PositionEngine>,
        withdrawals: Arc<WithdrawalEngine>,
    ) -> Self {
        Self {
            repo,
            deposits,
            positions,
            withdrawals,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/deposits", post(deposits::ingest_deposit))
        .route("/v1/accounts/:wallet", get(accounts::get_account))
        .route(
            "/v1/accounts/:wallet/deposits",
            get(deposits::get_account_deposits),
        )
        .route(
            "/v1/accounts/:wallet/positions",
            get(positions::get_account_positions),
        )
        .route("/v1/positions", post(positions::open_position))
        .route("/v1/positions/reinvest", post(positions::reinvest))
        .route("/v1/withdrawals/quote", get(withdrawals::get_quote))
        .route(
            "/v1/withdrawals",
            get(withdrawals::get_history).post(withdrawals::create_withdrawal),
        )
        .route("/v1/stats", get(stats::get_stats))
        .route(
            "/v1/admin/withdrawals/pending",
            get(admin::pending_withdrawals),
        )
        .route(
            "/v1/admin/withdrawals/:id/approve",
            post(admin::approve_withdrawal),
        )
        .route(
            "/v1/admin/withdrawals/:id/reject",
            post(admin::reject_withdrawal),
        )
        .route("/v1/admin/sweep", post(admin::run_sweep))
        .layer(cors)
        .with_state(state)
}
