// dbrestoretool/src/tracker/postgres.rs
use chrono::NaiveDate;
use sqlx::{Connection, PgConnection};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{BackupKey, HealthStatus, RestoreStatus, TrackerRecord, TrackerStore};
use crate::errors::{AppError, Result};

/// Advisory lock key guarding against two orchestrator runs at once ("dbrestor").
const RUN_LOCK_KEY: i64 = 0x6462_7265_7374_6f72;

const CREATE_TRACKER_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS db_restore_tracker (
        db_name        TEXT NOT NULL,
        restore_status TEXT NOT NULL DEFAULT 'pending',
        backup_date    DATE NOT NULL,
        health_status  TEXT NOT NULL DEFAULT 'not_checked',
        PRIMARY KEY (db_name, backup_date)
    )
"#;

/// Tracker store backed by the `db_restore_tracker` table.
///
/// Holds a single connection for the whole run: statements autocommit one by
/// one and the run lock is tied to this session.
pub struct PgTracker {
    conn: PgConnection,
}

impl PgTracker {
    pub async fn connect(tracker_db_url: &str) -> Result<Self> {
        let conn = PgConnection::connect(tracker_db_url)
            .await
            .map_err(AppError::Connection)?;
        Ok(PgTracker { conn })
    }

    /// Creates the tracker table when it is missing.
    pub async fn ensure_schema(&mut self) -> Result<()> {
        sqlx::query(CREATE_TRACKER_TABLE).execute(&mut self.conn).await?;
        Ok(())
    }

    /// Takes the session-level run lock. `false` means another run holds it.
    pub async fn try_acquire_run_lock(&mut self) -> Result<bool> {
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(acquired)
    }

    pub async fn release_run_lock(&mut self) -> Result<()> {
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut self.conn)
            .await?;
        if !released {
            warn!("Run lock was not held by this session when releasing it");
        }
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl TrackerStore for PgTracker {
    async fn lookup_existing(&mut self, dates: &[NaiveDate]) -> Result<HashSet<BackupKey>> {
        let rows: Vec<(String, NaiveDate)> = sqlx::query_as(
            "SELECT db_name, backup_date FROM db_restore_tracker WHERE backup_date = ANY($1)",
        )
        .bind(dates.to_vec())
        .fetch_all(&mut self.conn)
        .await?;

        debug!("Tracker already knows {} record(s) for {:?}", rows.len(), dates);
        Ok(rows
            .into_iter()
            .map(|(db_name, backup_date)| BackupKey::new(db_name, backup_date))
            .collect())
    }

    async fn register_pending(&mut self, key: &BackupKey) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO db_restore_tracker (db_name, restore_status, backup_date, health_status) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&key.db_name)
        .bind(RestoreStatus::Pending.as_str())
        .bind(key.backup_date)
        .bind(HealthStatus::NotChecked.as_str())
        .execute(&mut self.conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::DuplicateKey {
                    db_name: key.db_name.clone(),
                    backup_date: key.backup_date,
                })
            }
            Err(e) => Err(AppError::Tracker(e)),
        }
    }

    async fn fetch_pending_batch(&mut self, limit: usize) -> Result<Vec<TrackerRecord>> {
        let rows: Vec<(String, NaiveDate, String, Option<String>)> = sqlx::query_as(
            "SELECT db_name, backup_date, restore_status, health_status \
             FROM db_restore_tracker \
             WHERE restore_status = $1 \
             ORDER BY backup_date, db_name \
             LIMIT $2",
        )
        .bind(RestoreStatus::Pending.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut self.conn)
        .await?;

        rows.into_iter()
            .map(|(db_name, backup_date, restore_status, health_status)| -> Result<TrackerRecord> {
                Ok(TrackerRecord {
                    key: BackupKey::new(db_name, backup_date),
                    restore_status: restore_status.parse()?,
                    // Rows written by older tooling may carry NULL here.
                    health_status: match health_status {
                        Some(s) => s.parse()?,
                        None => HealthStatus::NotChecked,
                    },
                })
            })
            .collect()
    }

    async fn update_status(
        &mut self,
        key: &BackupKey,
        restore_status: RestoreStatus,
        health_status: HealthStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE db_restore_tracker SET restore_status = $1, health_status = $2 \
             WHERE db_name = $3 AND backup_date = $4",
        )
        .bind(restore_status.as_str())
        .bind(health_status.as_str())
        .bind(&key.db_name)
        .bind(key.backup_date)
        .execute(&mut self.conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!("No tracker row matched {} while updating status", key);
        } else {
            info!("Tracker updated for {} -> {}/{}", key, restore_status, health_status);
        }
        Ok(())
    }
}
