pub(crate) mod db_restore; // createdb / psql / sqlx access to the target server
pub(crate) mod extract;
mod logic;
pub(crate) mod scratch;
pub(crate) mod verification; // post-restore health check
#[cfg(test)]
pub(crate) mod testing;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::tracker::PgTracker;
use db_restore::PostgresEngine;

/// Public entry point for one unattended restore run.
///
/// Fails only when the tracker cannot be reached or the run cannot start;
/// individual project failures are recorded in the tracker instead.
pub async fn run_restore_flow(app_config: &AppConfig) -> Result<()> {
    let mut tracker = match PgTracker::connect(&app_config.tracker_db_url).await {
        Ok(tracker) => tracker,
        Err(e) => {
            error!("Failed to connect to tracker DB: {}", e);
            return Err(e).context("Tracker store is unreachable");
        }
    };
    info!("Connected to tracker DB.");

    if let Err(e) = tracker.ensure_schema().await {
        warn!("Could not verify tracker table, continuing with the existing one: {}", e);
    }

    if !tracker
        .try_acquire_run_lock()
        .await
        .context("Failed to take the tracker run lock")?
    {
        warn!("Another restore run holds the tracker lock; nothing to do.");
        tracker.close().await.ok();
        return Ok(());
    }

    let engine = PostgresEngine::new(&app_config.target_db_url)?;
    let today = Local::now().date_naive();

    let result =
        logic::perform_restore_orchestration(&mut tracker, &engine, &app_config.restore, today)
            .await;

    if let Err(e) = tracker.release_run_lock().await {
        warn!("Failed to release the tracker run lock: {}", e);
    }
    if let Err(e) = tracker.close().await {
        warn!("Failed to close tracker connection: {}", e);
    }

    let summary = result.context("Restore run aborted")?;
    info!(
        "Run summary: {} registered, {} processed, {} healthy, {} corrupted after restore, {} failed",
        summary.registered, summary.processed, summary.succeeded, summary.degraded, summary.failed
    );
    info!("All done.");
    Ok(())
}
