// dbrestoretool/src/discovery/pattern.rs
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use super::ArchiveKind;

static ARTIFACT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<db>[A-Za-z0-9_][A-Za-z0-9_-]*)_(?P<date>\d{4}-\d{2}-\d{2}|\d{8})\.sql\.(?P<ext>gz|zip)$")
        .expect("artifact name pattern is valid")
});

/// A backup file name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub db_name: String,
    pub backup_date: NaiveDate,
    pub kind: ArchiveKind,
}

/// Classifies `<db_name>_<YYYY-MM-DD|YYYYMMDD>.sql.<gz|zip>`.
///
/// Returns `None` for anything else, including dates that do not exist and
/// names starting with `-`, which client tools would read as options.
pub fn parse_artifact_name(file_name: &str) -> Option<ParsedName> {
    let caps = ARTIFACT_NAME.captures(file_name)?;
    let raw_date = &caps["date"];
    let format = if raw_date.contains('-') { "%Y-%m-%d" } else { "%Y%m%d" };
    let backup_date = NaiveDate::parse_from_str(raw_date, format).ok()?;
    let kind = match &caps["ext"] {
        "gz" => ArchiveKind::PlainCompressed,
        _ => ArchiveKind::EncryptedArchive,
    };
    Some(ParsedName {
        db_name: caps["db"].to_string(),
        backup_date,
        kind,
    })
}
