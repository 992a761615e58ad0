// dbrestoretool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKUP_DIR: &str = "/data/dbbackup";
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/dbrestore";
pub const DEFAULT_LOG_FILE: &str = "/var/log/db_restore.log";
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Hard ceiling on new registrations and restores per run.
pub const MAX_BATCH_SIZE: usize = 5;
pub const DEFAULT_ARCHIVE_SECRET_ENV: &str = "DB_RESTORE_ARCHIVE_SECRET";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub tracker_database_url: Option<String>,
    pub target_database_url: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub archive_secret_env: Option<String>,
}

/// Shared secret for password-protected backup archives.
///
/// Never printed: `Debug` is redacted so the config can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveSecret(String);

impl ArchiveSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        ArchiveSecret(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ArchiveSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ArchiveSecret(***)")
    }
}

/// Settings consumed by the restore orchestration.
#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub backup_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub batch_size: usize,
    pub archive_secret: Option<ArchiveSecret>,
}

// Application's internal configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tracker_db_url: String,
    pub target_db_url: String,
    pub log_file: PathBuf,
    pub restore: RestoreSettings,
}

impl AppConfig {
    /// Reads `config_path` and resolves the archive secret from the process environment.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Self::from_raw(raw_json_config, |name| std::env::var(name).ok())
    }

    /// Validates the raw config. `lookup_env` resolves the secret variable by name.
    pub fn from_raw<F>(raw: RawJsonConfig, lookup_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tracker_db_url = required_url(&raw.tracker_database_url, "tracker_database_url")?;
        let target_db_url = required_url(&raw.target_database_url, "target_database_url")?;

        let batch_size = raw.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(anyhow::anyhow!(
                "batch_size must be between 1 and {} in config.json, got {}.",
                MAX_BATCH_SIZE,
                batch_size
            ));
        }

        let backup_dir = non_empty_path(raw.backup_dir, DEFAULT_BACKUP_DIR);
        let scratch_dir = non_empty_path(raw.scratch_dir, DEFAULT_SCRATCH_DIR);
        if scratch_dir == backup_dir {
            return Err(anyhow::anyhow!(
                "scratch_dir must differ from backup_dir ({}); the scratch directory is purged after every run.",
                backup_dir.display()
            ));
        }

        let secret_env = raw
            .archive_secret_env
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_SECRET_ENV.to_string());
        let archive_secret = lookup_env(&secret_env)
            .filter(|s| !s.is_empty())
            .map(ArchiveSecret::new);

        Ok(AppConfig {
            tracker_db_url,
            target_db_url,
            log_file: non_empty_path(raw.log_file, DEFAULT_LOG_FILE),
            restore: RestoreSettings {
                backup_dir,
                scratch_dir,
                batch_size,
                archive_secret,
            },
        })
    }
}

fn required_url(value: &Option<String>, key: &str) -> Result<String> {
    let value = value
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .with_context(|| format!("{} must be set in config.json", key))?;
    url::Url::parse(value).with_context(|| format!("{} is not a valid database URL", key))?;
    Ok(value.clone())
}

fn non_empty_path(value: Option<PathBuf>, default: &str) -> PathBuf {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawJsonConfig {
        serde_json::from_value(value).expect("valid raw config")
    }

    #[test]
    fn test_defaults_applied() -> anyhow::Result<()> {
        let config = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://root:pw@10.0.0.8:5432/restore_tracker_db",
                "target_database_url": "postgres://root:pw@localhost:5432/postgres"
            })),
            |_| None,
        )?;

        assert_eq!(config.restore.backup_dir, PathBuf::from(DEFAULT_BACKUP_DIR));
        assert_eq!(config.restore.scratch_dir, PathBuf::from(DEFAULT_SCRATCH_DIR));
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(config.restore.batch_size, 5);
        assert!(config.restore.archive_secret.is_none());
        Ok(())
    }

    #[test]
    fn test_secret_read_from_named_variable() -> anyhow::Result<()> {
        let config = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://localhost/tracker",
                "target_database_url": "postgres://localhost/postgres",
                "archive_secret_env": "NIGHTLY_ZIP_PASSWORD"
            })),
            |name| (name == "NIGHTLY_ZIP_PASSWORD").then(|| "s3cret".to_string()),
        )?;

        let secret = config.restore.archive_secret.expect("secret resolved");
        assert_eq!(secret.expose(), "s3cret");
        assert_eq!(format!("{:?}", secret), "ArchiveSecret(***)");
        Ok(())
    }

    #[test]
    fn test_missing_tracker_url_rejected() {
        let result = AppConfig::from_raw(
            raw(json!({ "target_database_url": "postgres://localhost/postgres" })),
            |_| None,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("tracker_database_url"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://localhost/tracker",
                "target_database_url": "postgres://localhost/postgres",
                "batch_size": 0
            })),
            |_| None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_size_above_ceiling_rejected() {
        let result = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://localhost/tracker",
                "target_database_url": "postgres://localhost/postgres",
                "batch_size": 10
            })),
            |_| None,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("between 1 and 5"));
    }

    #[test]
    fn test_batch_size_at_ceiling_accepted() -> anyhow::Result<()> {
        let config = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://localhost/tracker",
                "target_database_url": "postgres://localhost/postgres",
                "batch_size": MAX_BATCH_SIZE
            })),
            |_| None,
        )?;
        assert_eq!(config.restore.batch_size, MAX_BATCH_SIZE);
        Ok(())
    }

    #[test]
    fn test_scratch_equal_to_backup_dir_rejected() {
        let result = AppConfig::from_raw(
            raw(json!({
                "tracker_database_url": "postgres://localhost/tracker",
                "target_database_url": "postgres://localhost/postgres",
                "backup_dir": "/data/dbbackup",
                "scratch_dir": "/data/dbbackup"
            })),
            |_| None,
        );
        assert!(result.is_err());
    }
}
