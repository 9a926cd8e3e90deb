//! Run configuration

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{MirrorError, Result};

/// Parameters of a mirroring session, with every path absolute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Tree to read from
    pub source: PathBuf,
    /// Tree to converge onto the source
    pub destination: PathBuf,
    /// Change log; its last line is the time of the last pass
    pub log_file: PathBuf,
    /// Minimum time between passes
    pub interval: Duration,
}

impl MirrorConfig {
    /// Build a config from user input, joining relative paths onto `cwd`.
    ///
    /// `.` and `..` components are folded away, so two spellings of one
    /// location compare equal in [`MirrorConfig::validate`] and in the log
    /// file exclusion of a pass.
    ///
    /// # Errors
    /// Returns an error if `interval_minutes` does not fit a [`Duration`]
    /// measured in seconds.
    pub fn resolve(
        cwd: &Path,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        log_file: impl AsRef<Path>,
        interval_minutes: u64,
    ) -> Result<Self> {
        let secs = interval_minutes.checked_mul(60).ok_or_else(|| {
            MirrorError::Config(format!(
                "interval of {interval_minutes} minutes is too large"
            ))
        })?;

        Ok(Self {
            source: normalize(&cwd.join(source)),
            destination: normalize(&cwd.join(destination)),
            log_file: normalize(&cwd.join(log_file)),
            interval: Duration::from_secs(secs),
        })
    }

    /// Reject configurations a pass could not run safely with.
    ///
    /// # Errors
    /// Returns [`MirrorError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(MirrorError::Config(
                "interval must be at least one minute".to_string(),
            ));
        }
        if !self.source.is_dir() {
            return Err(MirrorError::Config(format!(
                "source {} is not a directory",
                self.source.display()
            )));
        }
        if self.source == self.destination {
            return Err(MirrorError::Config(format!(
                "source and destination are both {}",
                self.source.display()
            )));
        }
        // Nested roots would mirror the mirror into itself, or delete the
        // source as "extra" destination files.
        if self.destination.starts_with(&self.source)
            || self.source.starts_with(&self.destination)
        {
            return Err(MirrorError::Config(format!(
                "source {} and destination {} must not contain one another",
                self.source.display(),
                self.destination.display()
            )));
        }
        Ok(())
    }
}

/// Lexically fold `.` and `..` without touching the filesystem. A `..` that
/// would climb above the root is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}
