// dbrestoretool/src/restore/db_restore.rs
use sqlx::{Connection, PgConnection};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::errors::{AppError, Result};
use crate::utils::find_executable;

/// Keep only the end of noisy client output in errors and logs.
const STDERR_TAIL_BYTES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseCreation {
    Created,
    AlreadyExists,
}

/// The relational engine backups are restored into.
pub trait DatabaseEngine {
    /// Creates `db_name` unless it exists. Only genuine failures are errors.
    async fn ensure_database_exists(&self, db_name: &str) -> Result<DatabaseCreation>;

    /// Bulk-loads `sql_path` into `db_name`. Any non-zero exit is `RestoreLoad`.
    async fn load_dump(&self, db_name: &str, sql_path: &Path) -> Result<()>;

    /// Tables of `db_name` over a fresh connection scoped to that database.
    async fn list_tables(&self, db_name: &str) -> Result<Vec<String>>;
}

/// PostgreSQL through `createdb`, `psql` and a direct `sqlx` connection.
#[derive(Debug, Clone)]
pub struct PostgresEngine {
    server_url: Url,
}

impl PostgresEngine {
    pub fn new(target_db_url: &str) -> anyhow::Result<Self> {
        let server_url = Url::parse(target_db_url)
            .map_err(|e| anyhow::anyhow!("Invalid target database URL: {}", e))?;
        Ok(PostgresEngine { server_url })
    }

    /// Connection URL for `db_name` on the target server, credentials included.
    fn database_url(&self, db_name: &str) -> Url {
        let mut url = self.server_url.clone();
        url.set_path(&format!("/{}", db_name));
        url
    }

    /// Builds a client command that receives the password through `PGPASSWORD`
    /// instead of its argument list.
    fn client_command(&self, program: &Path, url: &Url) -> (Command, String) {
        let mut command = Command::new(program);
        let mut public_url = url.clone();
        if let Some(password) = url.password() {
            command.env("PGPASSWORD", password);
            let _ = public_url.set_password(None);
        }
        (command, public_url.to_string())
    }

    fn createdb_command(&self, program: &Path, db_name: &str) -> Command {
        let (mut command, maintenance_url) = self.client_command(program, &self.server_url);
        command
            .arg("--maintenance-db")
            .arg(&maintenance_url)
            .arg("--")
            .arg(db_name);
        command
    }
}

fn locate_client(name: &str) -> std::result::Result<PathBuf, String> {
    find_executable(name).map_err(|e| format!("{:#}", e))
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// `createdb` reports an existing database on stderr; nothing else is benign.
fn is_already_exists(stderr: &str) -> bool {
    stderr.contains("already exists")
}

impl DatabaseEngine for PostgresEngine {
    async fn ensure_database_exists(&self, db_name: &str) -> Result<DatabaseCreation> {
        let creation_error = |stderr: String| AppError::DatabaseCreation {
            db_name: db_name.to_string(),
            stderr,
        };

        let createdb = locate_client("createdb").map_err(creation_error)?;
        let output = self
            .createdb_command(&createdb, db_name)
            .output()
            .await
            .map_err(|e| creation_error(format!("Failed to execute createdb: {}", e)))?;

        if output.status.success() {
            return Ok(DatabaseCreation::Created);
        }
        let stderr = stderr_tail(&output);
        if is_already_exists(&stderr) {
            debug!("createdb for {}: {}", db_name, stderr);
            return Ok(DatabaseCreation::AlreadyExists);
        }
        Err(creation_error(stderr))
    }

    async fn load_dump(&self, db_name: &str, sql_path: &Path) -> Result<()> {
        let load_error = |status: String, stderr: String| AppError::RestoreLoad {
            db_name: db_name.to_string(),
            status,
            stderr,
        };

        let psql = locate_client("psql").map_err(|e| load_error("not started".into(), e))?;
        let (mut command, db_url) = self.client_command(&psql, &self.database_url(db_name));
        info!(
            "Loading {} into database {} with psql",
            sql_path.display(),
            db_name
        );

        let output = command
            .arg("-X") // Do not read psqlrc
            .arg("-q")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-d")
            .arg(&db_url)
            .arg("-f")
            .arg(sql_path)
            .output()
            .await
            .map_err(|e| load_error("not started".into(), format!("Failed to execute psql: {}", e)))?;

        if !output.status.success() {
            return Err(load_error(output.status.to_string(), stderr_tail(&output)));
        }
        Ok(())
    }

    async fn list_tables(&self, db_name: &str) -> Result<Vec<String>> {
        let health_error = |reason: String| AppError::HealthCheck {
            db_name: db_name.to_string(),
            reason,
        };

        let mut conn = PgConnection::connect(self.database_url(db_name).as_str())
            .await
            .map_err(|e| health_error(format!("connection failed: {}", e)))?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT schemaname || '.' || tablename FROM pg_catalog.pg_tables \
             WHERE schemaname NOT IN ('pg_catalog', 'information_schema') \
             ORDER BY 1",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| health_error(format!("listing tables failed: {}", e)))?;

        let _ = conn.close().await;
        Ok(tables)
    }
}
