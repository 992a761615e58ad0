// In-memory tracker used by the orchestration tests.
use chrono::NaiveDate;
use std::collections::HashSet;

use super::{BackupKey, HealthStatus, RestoreStatus, TrackerRecord, TrackerStore};
use crate::errors::{AppError, Result};

#[derive(Debug, Default)]
pub struct MemoryTracker {
    records: Vec<TrackerRecord>,
    pub register_calls: usize,
    /// `lookup_existing` reports nothing, as when another run inserts the
    /// same rows between lookup and insert.
    pub stale_lookup: bool,
    pub fail_lookup: bool,
}

impl MemoryTracker {
    pub fn with_records(records: Vec<TrackerRecord>) -> Self {
        MemoryTracker {
            records,
            ..MemoryTracker::default()
        }
    }

    pub fn records(&self) -> &[TrackerRecord] {
        &self.records
    }

    pub fn get(&self, key: &BackupKey) -> Option<&TrackerRecord> {
        self.records.iter().find(|r| &r.key == key)
    }
}

impl TrackerStore for MemoryTracker {
    async fn lookup_existing(&mut self, dates: &[NaiveDate]) -> Result<HashSet<BackupKey>> {
        if self.fail_lookup {
            return Err(AppError::Tracker(sqlx::Error::PoolTimedOut));
        }
        if self.stale_lookup {
            return Ok(HashSet::new());
        }
        Ok(self
            .records
            .iter()
            .filter(|r| dates.contains(&r.key.backup_date))
            .map(|r| r.key.clone())
            .collect())
    }

    async fn register_pending(&mut self, key: &BackupKey) -> Result<()> {
        self.register_calls += 1;
        if self.get(key).is_some() {
            return Err(AppError::DuplicateKey {
                db_name: key.db_name.clone(),
                backup_date: key.backup_date,
            });
        }
        self.records.push(TrackerRecord {
            key: key.clone(),
            restore_status: RestoreStatus::Pending,
            health_status: HealthStatus::NotChecked,
        });
        Ok(())
    }

    async fn fetch_pending_batch(&mut self, limit: usize) -> Result<Vec<TrackerRecord>> {
        let mut pending: Vec<TrackerRecord> = self
            .records
            .iter()
            .filter(|r| r.restore_status == RestoreStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            (a.key.backup_date, &a.key.db_name).cmp(&(b.key.backup_date, &b.key.db_name))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn update_status(
        &mut self,
        key: &BackupKey,
        restore_status: RestoreStatus,
        health_status: HealthStatus,
    ) -> Result<()> {
        if let Some(record) = self.records.iter_mut().find(|r| &r.key == key) {
            record.restore_status = restore_status;
            record.health_status = health_status;
        }
        Ok(())
    }
}
