// dbrestoretool/src/tracker/mod.rs
pub(crate) mod postgres;
#[cfg(test)]
pub(crate) mod memory;

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AppError, Result};

pub use self::postgres::PgTracker;

/// Outcome of the load step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreStatus {
    Pending,
    Success,
    Failed,
}

/// Outcome of the post-restore verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    NotChecked,
    Healthy,
    Corrupted,
}

impl RestoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Pending => "pending",
            RestoreStatus::Success => "success",
            RestoreStatus::Failed => "failed",
        }
    }
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::NotChecked => "not_checked",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Corrupted => "corrupted",
        }
    }
}

impl FromStr for RestoreStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RestoreStatus::Pending),
            "success" => Ok(RestoreStatus::Success),
            "failed" => Ok(RestoreStatus::Failed),
            other => Err(AppError::InvalidStatus(other.to_string())),
        }
    }
}

impl FromStr for HealthStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not_checked" => Ok(HealthStatus::NotChecked),
            "healthy" => Ok(HealthStatus::Healthy),
            "corrupted" => Ok(HealthStatus::Corrupted),
            other => Err(AppError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a tracker record: one per (project, backup date).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackupKey {
    pub db_name: String,
    pub backup_date: NaiveDate,
}

impl BackupKey {
    pub fn new(db_name: impl Into<String>, backup_date: NaiveDate) -> Self {
        BackupKey {
            db_name: db_name.into(),
            backup_date,
        }
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.db_name, self.backup_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRecord {
    pub key: BackupKey,
    pub restore_status: RestoreStatus,
    pub health_status: HealthStatus,
}

/// Durable record of restore attempts.
///
/// Every mutating call is committed before it returns; there is no rollback
/// across calls, so a crash keeps whatever status was last written.
pub trait TrackerStore {
    /// Pairs already tracked for any of `dates`, in a single query.
    async fn lookup_existing(&mut self, dates: &[NaiveDate]) -> Result<HashSet<BackupKey>>;

    /// Inserts a `pending`/`not_checked` record. Fails with `DuplicateKey` if the pair exists.
    async fn register_pending(&mut self, key: &BackupKey) -> Result<()>;

    /// Up to `limit` pending records in stable order.
    async fn fetch_pending_batch(&mut self, limit: usize) -> Result<Vec<TrackerRecord>>;

    /// Sets both status columns in one statement.
    async fn update_status(
        &mut self,
        key: &BackupKey,
        restore_status: RestoreStatus,
        health_status: HealthStatus,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_forms() {
        for status in [RestoreStatus::Pending, RestoreStatus::Success, RestoreStatus::Failed] {
            assert_eq!(status.as_str().parse::<RestoreStatus>().unwrap(), status);
        }
        for status in [HealthStatus::NotChecked, HealthStatus::Healthy, HealthStatus::Corrupted] {
            assert_eq!(status.as_str().parse::<HealthStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(matches!(
            "restoring".parse::<RestoreStatus>(),
            Err(AppError::InvalidStatus(s)) if s == "restoring"
        ));
        assert!("ok".parse::<HealthStatus>().is_err());
    }
}
