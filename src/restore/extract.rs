// dbrestoretool/src/restore/extract.rs
use anyhow::{Context, Result as AnyResult};
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ArchiveSecret;
use crate::discovery::{ArchiveKind, BackupArtifact};
use crate::errors::{AppError, Result};

/// How the SQL dump was obtained from the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Decompressed,
    /// The `.gz` was not gzip at all and was taken as plain SQL.
    VerbatimCopy,
    Unzipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDump {
    pub sql_path: PathBuf,
    pub method: ExtractionMethod,
}

/// Produces a usable SQL dump for `artifact` inside `dest_dir`.
///
/// Every failure, including a missing dump after extraction, comes back as
/// `AppError::Extraction` with the underlying cause in its message.
pub fn extract(
    artifact: &BackupArtifact,
    dest_dir: &Path,
    secret: Option<&ArchiveSecret>,
) -> Result<ExtractedDump> {
    let db_name = &artifact.key.db_name;

    let dump = match artifact.kind {
        ArchiveKind::PlainCompressed => extract_plain_compressed(artifact, dest_dir),
        ArchiveKind::EncryptedArchive => match secret {
            Some(secret) => extract_encrypted_archive(artifact, dest_dir, secret),
            None => Err(anyhow::anyhow!(
                "no archive secret configured for {}",
                artifact.path.display()
            )),
        },
    }
    .map_err(|e| AppError::extraction(db_name, e))?;

    if !dump.sql_path.is_file() {
        return Err(AppError::extraction(
            db_name,
            format!("SQL file not found after extraction: {}", dump.sql_path.display()),
        ));
    }
    Ok(dump)
}

/// Full decompression dry-run, the in-process equivalent of `gzip -t`.
fn is_valid_gzip(path: &Path) -> AnyResult<bool> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open backup file: {}", path.display()))?;
    let mut decoder = MultiGzDecoder::new(file);
    Ok(io::copy(&mut decoder, &mut io::sink()).is_ok())
}

fn extract_plain_compressed(artifact: &BackupArtifact, dest_dir: &Path) -> AnyResult<ExtractedDump> {
    let sql_path = dest_dir.join(format!("{}.sql", artifact.key.db_name));

    if is_valid_gzip(&artifact.path)? {
        let input = File::open(&artifact.path)
            .with_context(|| format!("Failed to open backup file: {}", artifact.path.display()))?;
        let mut decoder = MultiGzDecoder::new(input);
        let mut output = File::create(&sql_path)
            .with_context(|| format!("Failed to create SQL file: {}", sql_path.display()))?;
        let bytes = io::copy(&mut decoder, &mut output).with_context(|| {
            format!(
                "Failed to decompress {} into {}",
                artifact.path.display(),
                sql_path.display()
            )
        })?;
        info!(
            "Decompressed {} ({} bytes) for {}",
            artifact.path.display(),
            bytes,
            artifact.key
        );
        return Ok(ExtractedDump {
            sql_path,
            method: ExtractionMethod::Decompressed,
        });
    }

    warn!(
        "Warning: {} is not a valid gzip. Copying as plain SQL.",
        artifact.path.display()
    );
    fs::copy(&artifact.path, &sql_path).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            artifact.path.display(),
            sql_path.display()
        )
    })?;
    Ok(ExtractedDump {
        sql_path,
        method: ExtractionMethod::VerbatimCopy,
    })
}

fn extract_encrypted_archive(
    artifact: &BackupArtifact,
    dest_dir: &Path,
    secret: &ArchiveSecret,
) -> AnyResult<ExtractedDump> {
    let written = unzip_with_secret(&artifact.path, dest_dir, secret.expose())?;
    info!(
        "Extracted {} file(s) from {} for {}",
        written,
        artifact.path.display(),
        artifact.key
    );

    let sql_path = find_sql_dump(dest_dir, &artifact.key.db_name).with_context(|| {
        format!(
            "No .sql file starting with '{}' inside {}",
            artifact.key.db_name,
            artifact.path.display()
        )
    })?;
    Ok(ExtractedDump {
        sql_path,
        method: ExtractionMethod::Unzipped,
    })
}

/// Extracts every entry of a password-protected zip below `dest_dir`.
fn unzip_with_secret(archive_path: &Path, dest_dir: &Path, secret: &str) -> AnyResult<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive file: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Invalid zip archive: {}", archive_path.display()))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index_decrypt(index, secret.as_bytes()).with_context(|| {
            format!(
                "Failed to decrypt entry #{} of {}",
                index,
                archive_path.display()
            )
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(
                "Skipping zip entry with unsafe path '{}' in {}",
                entry.name(),
                archive_path.display()
            );
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create directory: {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut output = File::create(&out_path)
            .with_context(|| format!("Failed to create file: {}", out_path.display()))?;
        io::copy(&mut entry, &mut output)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// First `<db_name>*.sql` file under `root`, walking in file-name order.
fn find_sql_dump(root: &Path, db_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(db_name) && name.ends_with(".sql"))
        })
        .map(|entry| entry.into_path())
}
