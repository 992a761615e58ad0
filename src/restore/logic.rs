// dbrestoretool/src/restore/logic.rs
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use super::db_restore::{DatabaseCreation, DatabaseEngine};
use super::extract::{ExtractedDump, ExtractionMethod, extract};
use super::scratch::ScratchWorkspace;
use super::verification::check_health;
use crate::config::{MAX_BATCH_SIZE, RestoreSettings};
use crate::discovery::{discover_new, discovery_window, locate_artifact_for};
use crate::errors::{AppError, Result};
use crate::tracker::{BackupKey, HealthStatus, RestoreStatus, TrackerStore};

/// Terminal state of one project within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    ExtractionFailed,
    CreationFailed,
    LoadFailed,
    Restored(HealthStatus),
}

impl ProjectOutcome {
    /// Status pair written back to the tracker.
    pub fn statuses(&self) -> (RestoreStatus, HealthStatus) {
        match self {
            ProjectOutcome::ExtractionFailed => (RestoreStatus::Failed, HealthStatus::Corrupted),
            ProjectOutcome::CreationFailed | ProjectOutcome::LoadFailed => {
                (RestoreStatus::Failed, HealthStatus::NotChecked)
            }
            ProjectOutcome::Restored(health) => (RestoreStatus::Success, *health),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub registered: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: ProjectOutcome) {
        self.processed += 1;
        match outcome {
            ProjectOutcome::Restored(HealthStatus::Healthy) => self.succeeded += 1,
            ProjectOutcome::Restored(_) => self.degraded += 1,
            _ => self.failed += 1,
        }
    }
}

/// One orchestrator run: register new backups, then restore a bounded batch
/// of pending records one after another.
///
/// At most `MAX_BATCH_SIZE` records are registered and restored, whatever
/// `settings.batch_size` says. Per-project failures end up in the tracker,
/// never in the returned error. Only a failure to fetch the pending batch
/// aborts the run; an unusable scratch directory leaves the batch pending.
pub async fn perform_restore_orchestration<T, E>(
    tracker: &mut T,
    engine: &E,
    settings: &RestoreSettings,
    today: NaiveDate,
) -> Result<RunSummary>
where
    T: TrackerStore,
    E: DatabaseEngine,
{
    let batch_size = settings.batch_size.min(MAX_BATCH_SIZE);
    let mut summary = RunSummary {
        registered: register_new_backups(tracker, settings, batch_size, today).await,
        ..RunSummary::default()
    };

    let projects = tracker.fetch_pending_batch(batch_size).await?;
    info!("Found {} pending project(s).", projects.len());

    let workspace = match ScratchWorkspace::prepare(&settings.scratch_dir) {
        Ok(workspace) => workspace,
        Err(e) => {
            error!(
                "Cannot prepare scratch directory {}, leaving {} project(s) pending: {}",
                settings.scratch_dir.display(),
                projects.len(),
                e
            );
            return Ok(summary);
        }
    };

    for project in &projects {
        let key = &project.key;
        let outcome = restore_project(engine, settings, &workspace, key).await;
        let (restore_status, health_status) = outcome.statuses();

        if let Err(e) = tracker.update_status(key, restore_status, health_status).await {
            error!("Failed to update tracker for {}: {}", key, e);
        }
        summary.record(outcome);
    }

    // Purged on drop, before the summary is logged.
    drop(workspace);
    Ok(summary)
}

/// Discovery step. Returns how many pending records were inserted.
async fn register_new_backups<T: TrackerStore>(
    tracker: &mut T,
    settings: &RestoreSettings,
    batch_size: usize,
    today: NaiveDate,
) -> usize {
    let window = discovery_window(today);
    let existing = match tracker.lookup_existing(&window).await {
        Ok(existing) => existing,
        Err(e) => {
            error!("Failed to read tracked backups, skipping discovery: {}", e);
            return 0;
        }
    };

    let new_entries = match discover_new(&settings.backup_dir, &existing, today, batch_size) {
        Ok(found) => found,
        Err(e) => {
            error!("Backup discovery failed: {}", e);
            return 0;
        }
    };
    info!(
        "Pending new entries: {:?}",
        new_entries.iter().map(|a| a.key.to_string()).collect::<Vec<_>>()
    );

    let mut registered = 0;
    for artifact in &new_entries {
        info!("Inserting pending entry for {}", artifact.key);
        match tracker.register_pending(&artifact.key).await {
            Ok(()) => registered += 1,
            Err(AppError::DuplicateKey { .. }) => {
                debug!("{} is already tracked; nothing to register", artifact.key);
            }
            Err(e) => error!("Failed to register {}: {}", artifact.key, e),
        }
    }
    registered
}

async fn restore_project<E: DatabaseEngine>(
    engine: &E,
    settings: &RestoreSettings,
    workspace: &ScratchWorkspace,
    key: &BackupKey,
) -> ProjectOutcome {
    info!("Processing database: {} (date: {})", key.db_name, key.backup_date);

    let dump = match prepare_dump(settings, workspace, key).await {
        Ok(dump) => dump,
        Err(e) => {
            error!("Extraction failed for {}: {}", key, e);
            return ProjectOutcome::ExtractionFailed;
        }
    };
    if dump.method == ExtractionMethod::VerbatimCopy {
        warn!("Restoring {} from an uncompressed dump", key);
    }

    match engine.ensure_database_exists(&key.db_name).await {
        Ok(DatabaseCreation::Created) => info!("Database created: {}", key.db_name),
        Ok(DatabaseCreation::AlreadyExists) => {
            info!("Database {} already exists; restoring into it", key.db_name)
        }
        Err(e) => {
            error!("DB creation failed for {}: {}", key, e);
            return ProjectOutcome::CreationFailed;
        }
    }

    if let Err(e) = engine.load_dump(&key.db_name, &dump.sql_path).await {
        error!("Restore failed for {}: {}", key, e);
        return ProjectOutcome::LoadFailed;
    }
    info!("Restore completed for {}", key);

    ProjectOutcome::Restored(check_health(engine, key).await)
}

/// Finds the artifact again and extracts it into the project's scratch directory.
async fn prepare_dump(
    settings: &RestoreSettings,
    workspace: &ScratchWorkspace,
    key: &BackupKey,
) -> Result<ExtractedDump> {
    let artifact = locate_artifact_for(&settings.backup_dir, key)?;
    info!("Found backup file: {}", artifact.path.display());

    let dest_dir = workspace
        .project_dir(key)
        .map_err(|e| AppError::extraction(&key.db_name, e))?;
    let secret = settings.archive_secret.clone();

    tokio::task::spawn_blocking(move || extract(&artifact, &dest_dir, secret.as_ref()))
        .await
        .map_err(|e| AppError::extraction(&key.db_name, e))?
}
