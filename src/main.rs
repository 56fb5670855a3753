use stakewell::engine::{DepositEngine, PositionEngine, WithdrawalEngine};
use stakewell::{api, config::Config, db::init_db, scheduler, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and engines
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let deposits = Arc::new(DepositEngine::new(repo.clone(), config.policy.clone()));
    let positions = Arc::new(PositionEngine::new(repo.clone(), config.policy.clone()));
    let withdrawals = Arc::new(WithdrawalEngine::new(repo.clone(), config.policy.clone()));

    // Daily yield sweep on the configured period
    scheduler::spawn_daily(
        positions.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );

    // Create router
    let app = api::create_router(api::AppState::new(repo, deposits, positions, withdrawals));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
