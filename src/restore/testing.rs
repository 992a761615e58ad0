// Scriptable stand-in for the database engine used by restore tests.
use std::path::Path;
use std::sync::Mutex;

use super::db_restore::{DatabaseCreation, DatabaseEngine};
use crate::errors::{AppError, Result};

#[derive(Debug, Default)]
pub struct FakeEngine {
    pub table_count: usize,
    pub creation: Option<DatabaseCreation>,
    pub creation_error: Option<String>,
    pub fail_load: bool,
    pub fail_health_query: bool,
    /// `(db_name, dump contents)` for every load attempt.
    pub loads: Mutex<Vec<(String, String)>>,
    pub health_checks: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn with_tables(table_count: usize) -> Self {
        FakeEngine {
            table_count,
            ..FakeEngine::default()
        }
    }

    pub fn loaded_databases(&self) -> Vec<String> {
        self.loads.lock().unwrap().iter().map(|(db, _)| db.clone()).collect()
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.lock().unwrap().len()
    }
}

impl DatabaseEngine for FakeEngine {
    async fn ensure_database_exists(&self, db_name: &str) -> Result<DatabaseCreation> {
        if let Some(stderr) = &self.creation_error {
            return Err(AppError::DatabaseCreation {
                db_name: db_name.to_string(),
                stderr: stderr.clone(),
            });
        }
        Ok(self.creation.unwrap_or(DatabaseCreation::Created))
    }

    async fn load_dump(&self, db_name: &str, sql_path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(sql_path)?;
        self.loads
            .lock()
            .unwrap()
            .push((db_name.to_string(), contents));
        if self.fail_load {
            return Err(AppError::RestoreLoad {
                db_name: db_name.to_string(),
                status: "exit status: 3".to_string(),
                stderr: "ERROR:  syntax error at or near \"INSRT\"".to_string(),
            });
        }
        Ok(())
    }

    async fn list_tables(&self, db_name: &str) -> Result<Vec<String>> {
        self.health_checks.lock().unwrap().push(db_name.to_string());
        if self.fail_health_query {
            return Err(AppError::HealthCheck {
                db_name: db_name.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok((0..self.table_count).map(|i| format!("public.table_{}", i)).collect())
    }
}

pub fn write_gzip(path: &Path, data: &[u8]) {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap();
}

pub fn write_encrypted_zip(path: &Path, entries: &[(&str, &[u8])], password: &str) {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default()
        .with_aes_encryption(zip::AesMode::Aes256, password);
    for (name, data) in entries {
        writer.start_file(*name, options.clone()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Legacy ZipCrypto archive, the format `zip -P` produces.
pub fn write_zipcrypto_zip(path: &Path, entries: &[(&str, &[u8])], password: &str) {
    use std::io::Write;
    use zip::unstable::write::FileOptionsExt;

    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options =
        zip::write::SimpleFileOptions::default().with_deprecated_encryption(password.as_bytes());
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}
