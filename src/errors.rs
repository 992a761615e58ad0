use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Tracker connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Tracker query failed: {0}")]
    Tracker(#[from] sqlx::Error),

    #[error("Tracker record already exists for {db_name} ({backup_date})")]
    DuplicateKey {
        db_name: String,
        backup_date: NaiveDate,
    },

    #[error("Invalid status value in tracker: '{0}'")]
    InvalidStatus(String),

    #[error("Backup file not found for {db_name} ({backup_date}) in {}", .backup_dir.display())]
    ArtifactNotFound {
        db_name: String,
        backup_date: NaiveDate,
        backup_dir: PathBuf,
    },

    #[error("Extraction failed for {db_name}: {reason}")]
    Extraction { db_name: String, reason: String },

    #[error("Database creation failed for {db_name}: {stderr}")]
    DatabaseCreation { db_name: String, stderr: String },

    #[error("Restore failed for {db_name} ({status}): {stderr}")]
    RestoreLoad {
        db_name: String,
        status: String,
        stderr: String,
    },

    #[error("Health check failed for {db_name}: {reason}")]
    HealthCheck { db_name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Wraps any extraction-side failure, keeping the full cause chain for the log.
    pub fn extraction(db_name: &str, cause: impl std::fmt::Display) -> Self {
        AppError::Extraction {
            db_name: db_name.to_string(),
            reason: format!("{:#}", cause),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
