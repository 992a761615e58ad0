// dbrestoretool/src/restore/verification.rs
use tracing::{error, info, warn};

use super::db_restore::DatabaseEngine;
use crate::tracker::{BackupKey, HealthStatus};

/// Post-restore liveness check: at least one table must exist.
///
/// Never fails; connection and query errors degrade to `Corrupted`. Row counts
/// and checksums are not inspected.
pub async fn check_health<E: DatabaseEngine>(engine: &E, key: &BackupKey) -> HealthStatus {
    match engine.list_tables(&key.db_name).await {
        Ok(tables) if tables.is_empty() => {
            warn!("Health check: {} -> corrupted (no tables found)", key);
            HealthStatus::Corrupted
        }
        Ok(tables) => {
            info!("Health check: {} -> healthy ({} tables)", key, tables.len());
            HealthStatus::Healthy
        }
        Err(e) => {
            error!("Health check failed for {}: {}", key, e);
            HealthStatus::Corrupted
        }
    }
}
