//! Recorded session filenames: `<yymmdd>-<hhmmss>_<session>_<STREAM><n>.(csv|json)`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ReplayError, ReplayResult};

static SESSION_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{6})-(\d{6})_(.+)_([A-Za-z]+)(\d)\.((?i:csv|json))$")
        .expect("session filename pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    Csv,
    Json,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Json => "json",
        }
    }
}

/// Date, time and name shared by every file of one recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub date: String,
    pub time: String,
    pub session: String,
}

impl SessionKey {
    /// `YYYY-MM-DD HH:MM:SS <session>`, or the raw digits when they are not
    /// a calendar date and time.
    pub fn label(&self) -> String {
        let date = NaiveDate::parse_from_str(&self.date, "%y%m%d");
        let time = NaiveTime::parse_from_str(&self.time, "%H%M%S");
        match (date, time) {
            (Ok(date), Ok(time)) => format!(
                "{} {} {}",
                date.format("%Y-%m-%d"),
                time.format("%H:%M:%S"),
                self.session
            ),
            _ => format!("{}-{} {}", self.date, self.time, self.session),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A parsed session filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFileName {
    pub filename: String,
    pub key: SessionKey,
    /// Stream type embedded in the name, e.g. `EEG`.
    pub stream: String,
    pub index: u8,
    pub kind: FileKind,
}

impl SessionFileName {
    pub fn parse(filename: &str) -> Option<Self> {
        let caps = SESSION_FILE.captures(filename)?;
        let kind = if caps[6].eq_ignore_ascii_case("csv") {
            FileKind::Csv
        } else {
            FileKind::Json
        };
        Some(Self {
            filename: filename.to_string(),
            key: SessionKey {
                date: caps[1].to_string(),
                time: caps[2].to_string(),
                session: caps[3].to_string(),
            },
            stream: caps[4].to_string(),
            index: caps[5].parse().ok()?,
            kind,
        })
    }
}

/// Validate a (directory, filename, stream type) triple and return the
/// resolved file path with its parsed name.
pub(crate) fn validate_session_file(
    path: &Path,
    filename: &str,
    stream_type: &str,
    kind: FileKind,
) -> ReplayResult<(PathBuf, SessionFileName)> {
    if !path.is_dir() {
        return Err(ReplayError::InvalidPath(path.to_path_buf()));
    }
    let dir = path.canonicalize()?;

    let name = SessionFileName::parse(filename)
        .ok_or_else(|| ReplayError::InvalidFilename(filename.to_string()))?;
    if name.kind != kind {
        return Err(ReplayError::WrongFileType {
            filename: filename.to_string(),
            expected: kind.extension(),
        });
    }
    if name.stream != stream_type {
        return Err(ReplayError::StreamTypeMismatch {
            filename: filename.to_string(),
            requested: stream_type.to_string(),
            found: name.stream,
        });
    }

    let file = dir.join(filename);
    if !file.is_file() {
        return Err(ReplayError::FileNotFound(file));
    }
    Ok((file, name))
}
