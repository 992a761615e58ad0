// dbrestoretool/src/discovery/mod.rs
pub(crate) mod pattern;

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{AppError, Result};
use crate::tracker::BackupKey;
use pattern::parse_artifact_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// `.sql.gz`
    PlainCompressed,
    /// `.sql.zip`, password protected
    EncryptedArchive,
}

/// A backup file on disk. Only ever read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub key: BackupKey,
    pub kind: ArchiveKind,
    pub path: PathBuf,
}

/// The dates discovery looks at: yesterday and today.
pub fn discovery_window(today: NaiveDate) -> Vec<NaiveDate> {
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    vec![yesterday, today]
}

/// Lists regular files directly under `backup_dir` in lexicographic order.
/// Symlinks count when they resolve to a regular file.
fn sorted_entries(backup_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(backup_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            AppError::Io(std::io::Error::other(format!(
                "Failed to read backup directory {}: {}",
                backup_dir.display(),
                e
            )))
        })?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            entries.push((name.to_string(), entry.path().to_path_buf()));
        }
    }
    Ok(entries)
}

/// Finds backups from yesterday or today that the tracker does not know yet.
///
/// Stops after `limit` artifacts so one run cannot flood the pipeline.
pub fn discover_new(
    backup_dir: &Path,
    existing: &HashSet<BackupKey>,
    today: NaiveDate,
    limit: usize,
) -> Result<Vec<BackupArtifact>> {
    let window = discovery_window(today);
    let mut seen: HashSet<BackupKey> = HashSet::new();
    let mut found = Vec::new();

    for (name, path) in sorted_entries(backup_dir)? {
        if found.len() >= limit {
            break;
        }
        let Some(parsed) = parse_artifact_name(&name) else {
            continue;
        };
        if !window.contains(&parsed.backup_date) {
            continue;
        }
        let key = BackupKey::new(parsed.db_name, parsed.backup_date);
        if existing.contains(&key) || seen.contains(&key) {
            debug!("Skipping {}: {} already tracked", name, key);
            continue;
        }
        seen.insert(key.clone());
        found.push(BackupArtifact {
            key,
            kind: parsed.kind,
            path,
        });
    }

    Ok(found)
}

/// Re-resolves the artifact for a pending record.
///
/// Plain-compressed files win over encrypted archives; within a kind the
/// first name in lexicographic order wins. Either date spelling matches.
pub fn locate_artifact_for(backup_dir: &Path, key: &BackupKey) -> Result<BackupArtifact> {
    let candidates: Vec<(ArchiveKind, PathBuf)> = sorted_entries(backup_dir)?
        .into_iter()
        .filter_map(|(name, path)| {
            let parsed = parse_artifact_name(&name)?;
            (parsed.db_name == key.db_name && parsed.backup_date == key.backup_date)
                .then_some((parsed.kind, path))
        })
        .collect();

    [ArchiveKind::PlainCompressed, ArchiveKind::EncryptedArchive]
        .into_iter()
        .find_map(|wanted| {
            candidates
                .iter()
                .find(|(kind, _)| *kind == wanted)
                .map(|(kind, path)| BackupArtifact {
                    key: key.clone(),
                    kind: *kind,
                    path: path.clone(),
                })
        })
        .ok_or_else(|| AppError::ArtifactNotFound {
            db_name: key.db_name.clone(),
            backup_date: key.backup_date,
            backup_dir: backup_dir.to_path_buf(),
        })
}
