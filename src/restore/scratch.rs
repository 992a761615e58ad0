// dbrestoretool/src/restore/scratch.rs
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

use crate::tracker::BackupKey;

/// Per-run extraction directory.
///
/// Everything inside it is removed by `purge`, and again on drop so an early
/// return or panic still leaves it empty. The directory itself is kept.
#[derive(Debug)]
pub struct ScratchWorkspace {
    root: PathBuf,
}

impl ScratchWorkspace {
    pub fn prepare(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(ScratchWorkspace {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh subdirectory for one project, e.g. `orders_2025-06-01`.
    ///
    /// The name must stay a single plain component so nothing outside the
    /// root is ever removed.
    pub fn project_dir(&self, key: &BackupKey) -> io::Result<PathBuf> {
        let name = format!("{}_{}", key.db_name, key.backup_date.format("%Y-%m-%d"));
        let mut components = Path::new(&name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("database name {:?} is not usable as a directory name", key.db_name),
            ));
        }
        let dir = self.root.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn purge(&self) -> io::Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        match self.purge() {
            Ok(()) => info!("Temporary files cleaned up in {}", self.root().display()),
            Err(e) => warn!("Failed to clean temporary files in {}: {}", self.root().display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_purge_on_drop_keeps_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dbrestore");
        {
            let workspace = ScratchWorkspace::prepare(&root).unwrap();
            let key = BackupKey::new("orders", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
            let project = workspace.project_dir(&key).unwrap();
            assert!(project.ends_with("orders_2025-06-01"));
            fs::write(project.join("orders.sql"), b"CREATE TABLE t();").unwrap();
            fs::write(workspace.root().join("stray.sql"), b"").unwrap();
        }
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_project_dir_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dbrestore");
        let outside = dir.path().join("keep_2025-06-01");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("data.sql"), b"").unwrap();
        let workspace = ScratchWorkspace::prepare(&root).unwrap();
        let backup_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        for db_name in ["../keep", "a/b", "/etc/x"] {
            let err = workspace
                .project_dir(&BackupKey::new(db_name, backup_date))
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{}", db_name);
        }
        assert!(outside.join("data.sql").is_file());
    }

    #[test]
    fn test_project_dir_starts_empty() {
        let dir = TempDir::new().unwrap();
        let workspace = ScratchWorkspace::prepare(dir.path()).unwrap();
        let key = BackupKey::new("orders", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());

        let first = workspace.project_dir(&key).unwrap();
        fs::write(first.join("leftover.sql"), b"").unwrap();
        let second = workspace.project_dir(&key).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(&second).unwrap().count(), 0);
    }
}
