//! Database Restore Tool
//!
//! Finds recent database backups, restores them into PostgreSQL and records
//! every attempt in a tracker table. Meant to be run periodically, unattended.

// dbrestoretool/src/main.rs
mod config;
mod discovery;
mod errors;
mod restore;
mod tracker;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();

    // Config path is the only argument; there is no interactive input.
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let app_config = AppConfig::load_from_json(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;

    utils::logging::init_logging(&app_config.log_file)?;
    if app_config.restore.archive_secret.is_none() {
        tracing::warn!("No archive secret configured; encrypted .sql.zip backups will fail extraction.");
    }

    restore::run_restore_flow(&app_config)
        .await
        .context("Restore process failed")
}
