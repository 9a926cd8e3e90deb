//! Append-only change log
//!
//! One line per action, in the format
//!
//! ```text
//! [16/10/2026 14:03:27] Created: /backup/docs/a.txt
//! ```
//!
//! The timestamp of the last line doubles as the time of the last
//! reconciliation pass, so the format must stay stable across versions.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike as _};

use crate::error::{MirrorError, Result};

/// `strftime` pattern of the bracketed timestamp
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Current local time, truncated to what the log can represent
#[must_use]
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Render a timestamp the way the log writes it
#[must_use]
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// What happened to a destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Updated" => Ok(Self::Updated),
            "Deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

/// A single line of the change log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub action: Action,
    /// Absolute destination path the action applied to
    pub path: PathBuf,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            format_timestamp(self.timestamp),
            self.action,
            self.path.display()
        )
    }
}

impl FromStr for LogEntry {
    type Err = MirrorError;

    fn from_str(line: &str) -> Result<Self> {
        let timestamp = parse_timestamp_prefix(line)?;
        let rest = line
            .split_once("] ")
            .map(|(_, rest)| rest)
            .ok_or_else(|| parse_error(line, "missing space after timestamp"))?;
        let (action, path) = rest
            .split_once(": ")
            .ok_or_else(|| parse_error(line, "missing action separator"))?;
        let action = action
            .parse::<Action>()
            .map_err(|reason| parse_error(line, reason))?;

        Ok(Self {
            timestamp,
            action,
            path: PathBuf::from(path),
        })
    }
}

fn parse_error(line: &str, reason: impl Into<String>) -> MirrorError {
    MirrorError::LogParse {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Extract and parse the `[...]` prefix of a log line
fn parse_timestamp_prefix(line: &str) -> Result<NaiveDateTime> {
    let inner = line
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(ts, _)| ts)
        .ok_or_else(|| parse_error(line, "missing bracketed timestamp"))?;

    NaiveDateTime::parse_from_str(inner, TIMESTAMP_FORMAT)
        .map_err(|e| parse_error(line, e.to_string()))
}

/// Handle to the change log file.
///
/// Every append opens, writes and closes the file. There is no locking, so
/// only one process may target a given log at a time.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty log if none exists. Never truncates.
    pub fn ensure_exists(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(drop)
            .map_err(|e| MirrorError::io("create log", &self.path, e))
    }

    /// Append an entry stamped with the current local time
    pub fn append(&self, action: Action, target: &Path) -> Result<LogEntry> {
        self.append_at(now_local(), action, target)
    }

    /// Append an entry with an explicit timestamp
    pub fn append_at(
        &self,
        timestamp: NaiveDateTime,
        action: Action,
        target: &Path,
    ) -> Result<LogEntry> {
        let entry = LogEntry {
            timestamp,
            action,
            path: target.to_path_buf(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MirrorError::io("open log", &self.path, e))?;
        // Single write so a line is never interleaved with itself
        file.write_all(format!("{entry}\n").as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| MirrorError::io("append to log", &self.path, e))?;

        Ok(entry)
    }

    /// Timestamp of the last entry.
    ///
    /// A missing or empty log yields [`NaiveDateTime::MIN`], which reads as
    /// "never ran". A malformed last line is a [`MirrorError::LogParse`].
    pub fn last_timestamp(&self) -> Result<NaiveDateTime> {
        let Some(contents) = self.read()? else {
            return Ok(NaiveDateTime::MIN);
        };

        match contents.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => parse_timestamp_prefix(line),
            None => Ok(NaiveDateTime::MIN),
        }
    }

    /// Every entry in file order
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        let Some(contents) = self.read()? else {
            return Ok(Vec::new());
        };

        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::parse::<LogEntry>)
            .collect()
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MirrorError::io("read log", &self.path, e)),
        }
    }
}
