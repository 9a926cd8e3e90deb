//! Lazy directory tree traversal via the `ignore` crate

use std::path::PathBuf;

use ignore::{DirEntry, WalkBuilder};
use tracing::debug;

use crate::error::{MirrorError, Result};

/// What a walked entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// A symbolic link, whatever it points at. Never followed by the walk.
    Symlink,
}

impl EntryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dir => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
        }
    }
}

/// One entry found under a walk root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the walk root
    pub relative: PathBuf,
    pub kind: EntryKind,
}

/// Walker over every directory, regular file and symbolic link beneath a root.
///
/// Unlike a source-code scanner this does not honor `.gitignore`, hidden-file
/// rules or any other filter: a mirror must carry everything. Symbolic links
/// are reported as [`EntryKind::Symlink`] and never descended into.
pub struct TreeWalker {
    root: PathBuf,
    excludes: Vec<PathBuf>,
}

impl TreeWalker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excludes: Vec::new(),
        }
    }

    /// Leave out an exact path (and everything beneath it)
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excludes.push(path.into());
        self
    }

    fn walk_builder(&self) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        if !self.excludes.is_empty() {
            let excludes = self.excludes.clone();
            builder.filter_entry(move |e| !excludes.iter().any(|x| x == e.path()));
        }

        builder
    }

    /// Lazily yield `(relative path, kind)` pairs in file-name order, parents
    /// before children. The root itself is not yielded.
    pub fn entries(&self) -> impl Iterator<Item = Result<TreeEntry>> + '_ {
        self.walk_builder()
            .build()
            .filter_map(move |result| match result {
                Ok(entry) => self.classify(&entry).transpose(),
                Err(err) => Some(Err(MirrorError::Walk(err))),
            })
    }

    fn classify(&self, entry: &DirEntry) -> Result<Option<TreeEntry>> {
        if entry.depth() == 0 {
            return Ok(None);
        }

        let Some(file_type) = entry.file_type() else {
            return Ok(None);
        };
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            debug!("Skipping non-regular entry {}", entry.path().display());
            return Ok(None);
        };

        let relative = entry
            .path()
            .strip_prefix(&self.root)
            .map_err(|_| MirrorError::OutsideRoot {
                path: entry.path().to_path_buf(),
                root: self.root.clone(),
            })?
            .to_path_buf();

        Ok(Some(TreeEntry { relative, kind }))
    }
}
