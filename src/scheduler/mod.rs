//! Daily sweep scheduling.
//!
//! The sweep is injected behind `DailyTask` so the yield logic tests
//! without a timer; production wiring runs `spawn_daily` with a
//! one-day period. Overlap protection lives in the task itself (the
//! Position Engine's single-flight gate), so a manual admin trigger
//! and the timer can never run a sweep concurrently.

use crate::engine::PositionEngine;
use crate::error::CoreError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Anything the scheduler drives once per period.
#[async_trait]
pub trait DailyTask: Send + Sync {
    async fn on_tick(&self) -> Result<(), CoreError>;
}

#[async_trait]
impl DailyTask for PositionEngine {
    async fn on_tick(&self) -> Result<(), CoreError> {
        let report = self.run_daily_sweep().await?;
        info!(
            processed = report.processed,
            unlocked = report.unlocked,
            still_active = report.still_active,
            failed = report.failed,
            "scheduled yield sweep complete"
        );
        Ok(())
    }
}

/// Drive `task` every `period`, starting one period from now.
pub fn spawn_daily(task: Arc<dyn DailyTask>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; the
        // sweep should first run a full period after startup.
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = task.on_tick().await {
                error!(error = %e, "scheduled task failed");
            }
        }
    })
}
