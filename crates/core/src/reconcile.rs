//! One-way reconciliation of a destination tree against a source tree
//!
//! A pass runs in two phases. The first walks the source, creating missing
//! directories and copying every file that is absent from the destination or
//! whose fingerprint differs. The second walks the destination and deletes
//! every file or symbolic link that has no file counterpart in the source.
//! All copies finish before any delete starts, so a moved file is never
//! missing from both places at once.
//!
//! A symbolic link in the source is mirrored as what it points at: the
//! contents of a linked file, or a plain directory for a linked directory
//! (which is not descended into). Directories left empty by the second phase
//! are not removed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use filetime::FileTime;
use tracing::{debug, warn};

use crate::changelog::{Action, ChangeLog, LogEntry, now_local};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::hash::Fingerprint;
use crate::scan::{EntryKind, TreeWalker};

/// Receives progress of passes and of the schedule around them.
///
/// Every method has an empty default so callers implement only what they
/// display.
pub trait MirrorObserver {
    /// A change was applied and written to the log.
    fn on_entry(&mut self, _entry: &LogEntry) {}

    /// A pass finished without error.
    fn on_pass_complete(&mut self, _report: &PassReport, _at: NaiveDateTime) {}

    /// The scheduler is about to sleep before the next check.
    fn on_wait(&mut self, _remaining: Duration) {}
}

impl MirrorObserver for () {}

/// What a pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Entries that vanished between enumeration and access
    pub skipped: usize,
}

impl PassReport {
    /// Number of log entries the pass wrote
    #[must_use]
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes() == 0
    }

    fn count(&mut self, action: Action) {
        match action {
            Action::Created => self.created += 1,
            Action::Updated => self.updated += 1,
            Action::Deleted => self.deleted += 1,
        }
    }
}

/// Mirrors `source` into `destination`, logging every file change.
#[derive(Debug, Clone)]
pub struct Reconciler {
    source: PathBuf,
    destination: PathBuf,
    log: ChangeLog,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        log: ChangeLog,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            log,
        }
    }

    #[must_use]
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(
            &config.source,
            &config.destination,
            ChangeLog::new(&config.log_file),
        )
    }

    #[must_use]
    pub fn log(&self) -> &ChangeLog {
        &self.log
    }

    /// Run one full pass.
    ///
    /// # Errors
    /// Aborts on the first failure that is not a vanished entry. Changes made
    /// before the failure stay applied and logged.
    pub fn run(&self, observer: &mut dyn MirrorObserver) -> Result<PassReport> {
        if !self.source.is_dir() {
            return Err(MirrorError::MissingSource(self.source.clone()));
        }
        fs::create_dir_all(&self.destination)
            .map_err(|e| MirrorError::io("create directory", &self.destination, e))?;

        let mut report = PassReport::default();
        self.propagate_updates(&mut report, observer)?;
        self.propagate_deletes(&mut report, observer)?;

        debug!(
            "Pass finished: {} created, {} updated, {} deleted, {} skipped",
            report.created, report.updated, report.deleted, report.skipped
        );
        observer.on_pass_complete(&report, now_local());
        Ok(report)
    }

    /// The log file, plus its mirror-image path in the other tree, must never
    /// be copied over or deleted by the pass that writes it.
    fn walker(&self, root: &Path) -> TreeWalker {
        let log = self.log.path();
        let mut walker = TreeWalker::new(root).exclude(log);
        if let Ok(rel) = log.strip_prefix(&self.destination) {
            walker = walker.exclude(self.source.join(rel));
        }
        if let Ok(rel) = log.strip_prefix(&self.source) {
            walker = walker.exclude(self.destination.join(rel));
        }
        walker
    }

    fn propagate_updates(
        &self,
        report: &mut PassReport,
        observer: &mut dyn MirrorObserver,
    ) -> Result<()> {
        for entry in self.walker(&self.source).entries() {
            let Some(entry) = skip_vanished(entry, report)? else {
                continue;
            };

            let applied = match entry.kind {
                EntryKind::Dir => {
                    self.mirror_dir(&entry.relative)?;
                    continue;
                }
                EntryKind::File => self.mirror_file(&entry.relative),
                EntryKind::Symlink => self.mirror_symlink(&entry.relative),
            };
            if let Some(Some(logged)) = skip_vanished(applied, report)? {
                report.count(logged.action);
                observer.on_entry(&logged);
            }
        }
        Ok(())
    }

    fn propagate_deletes(
        &self,
        report: &mut PassReport,
        observer: &mut dyn MirrorObserver,
    ) -> Result<()> {
        for entry in self.walker(&self.destination).entries() {
            let Some(entry) = skip_vanished(entry, report)? else {
                continue;
            };
            if entry.kind == EntryKind::Dir {
                continue;
            }
            if resolves_to_file(&self.source.join(&entry.relative))? {
                continue;
            }

            let target = self.destination.join(&entry.relative);
            let removed =
                fs::remove_file(&target).map_err(|e| MirrorError::io("delete", &target, e));
            if skip_vanished(removed, report)?.is_none() {
                continue;
            }

            let logged = self.log.append(Action::Deleted, &target)?;
            report.count(Action::Deleted);
            observer.on_entry(&logged);
        }
        Ok(())
    }

    fn mirror_dir(&self, relative: &Path) -> Result<()> {
        let target = self.destination.join(relative);
        match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(meta) => Err(MirrorError::KindMismatch {
                path: target,
                expected: EntryKind::Dir.as_str(),
                found: kind_name(&meta),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&target)
                    .map_err(|e| MirrorError::io("create directory", &target, e))?;
                debug!("Created directory {}", target.display());
                Ok(())
            }
            Err(e) => Err(MirrorError::io("inspect", &target, e)),
        }
    }

    /// Mirror the target of a source symlink. Links that do not resolve are
    /// skipped.
    fn mirror_symlink(&self, relative: &Path) -> Result<Option<LogEntry>> {
        let source = self.source.join(relative);
        match fs::metadata(&source) {
            Ok(meta) if meta.is_file() => self.mirror_file(relative),
            Ok(meta) if meta.is_dir() => {
                self.mirror_dir(relative)?;
                Ok(None)
            }
            Ok(meta) => {
                debug!("Skipping link to {} {}", kind_name(&meta), source.display());
                Ok(None)
            }
            Err(e) => {
                warn!("Skipping unresolvable symlink {}: {e}", source.display());
                Ok(None)
            }
        }
    }

    /// Copy one file if needed. Returns the logged entry, or `None` when the
    /// destination already matches.
    fn mirror_file(&self, relative: &Path) -> Result<Option<LogEntry>> {
        let source = self.source.join(relative);
        let target = self.destination.join(relative);

        let action = match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_file() => {
                if Fingerprint::from_file(&source)? == Fingerprint::from_file(&target)? {
                    return Ok(None);
                }
                make_writable(&target, meta.permissions())?;
                Action::Updated
            }
            Ok(meta) => {
                return Err(MirrorError::KindMismatch {
                    path: target,
                    expected: EntryKind::File.as_str(),
                    found: kind_name(&meta),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Action::Created,
            Err(e) => return Err(MirrorError::io("inspect", &target, e)),
        };

        copy_preserving_metadata(&source, &target)?;
        self.log.append(action, &target).map(Some)
    }
}

fn skip_vanished<T>(result: Result<T>, report: &mut PassReport) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_vanished() => {
            warn!("Skipping entry that disappeared mid-pass: {err}");
            report.skipped += 1;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Whether phase 1 would mirror `path` as a file: a regular file, or a
/// symlink that resolves to one.
fn resolves_to_file(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(false)
        }
        Err(_) if path.is_symlink() => Ok(false),
        Err(e) => Err(MirrorError::io("inspect", path, e)),
    }
}

fn kind_name(meta: &fs::Metadata) -> &'static str {
    let file_type = meta.file_type();
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_file() {
        "file"
    } else if file_type.is_symlink() {
        "symlink"
    } else {
        "special file"
    }
}

/// A read-only mirror (copied from a read-only source) must still accept the
/// next update.
fn make_writable(path: &Path, mut perms: fs::Permissions) -> Result<()> {
    if !perms.readonly() {
        return Ok(());
    }
    #[allow(
        clippy::permissions_set_readonly_false,
        reason = "the copy that follows overwrites the mode"
    )]
    perms.set_readonly(false);
    fs::set_permissions(path, perms).map_err(|e| MirrorError::io("unlock", path, e))
}

/// Copy contents and permission bits, then carry over access and
/// modification times.
fn copy_preserving_metadata(source: &Path, target: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| MirrorError::io("inspect", source, e))?;
    fs::copy(source, target).map_err(|e| MirrorError::io("copy", source, e))?;

    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(target, atime, mtime)
        .map_err(|e| MirrorError::io("set times on", target, e))
}
