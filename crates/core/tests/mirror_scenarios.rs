//! End-to-end reconciliation scenarios against real temporary trees

use std::fs;
use std::path::{Path, PathBuf};

use dirmirror_core::{
    Action, ChangeLog, EntryKind, Fingerprint, LogEntry, MirrorConfig, Reconciler, TreeWalker,
};
use tempfile::TempDir;

struct Mirror {
    _dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
    log: ChangeLog,
    reconciler: Reconciler,
}

impl Mirror {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let dest = dir.path().join("dest");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&dest).unwrap();
        let log = ChangeLog::new(dir.path().join("log.txt"));
        log.ensure_exists().unwrap();
        let reconciler = Reconciler::new(&source, &dest, log.clone());
        Self {
            _dir: dir,
            source,
            dest,
            log,
            reconciler,
        }
    }

    fn write_source(&self, rel: &str, contents: &str) {
        write(&self.source.join(rel), contents);
    }

    fn write_dest(&self, rel: &str, contents: &str) {
        write(&self.dest.join(rel), contents);
    }

    fn pass(&self) -> Vec<LogEntry> {
        let before = self.log.entries().unwrap().len();
        self.reconciler.run(&mut ()).unwrap();
        self.log.entries().unwrap().split_off(before)
    }

    fn assert_converged(&self) {
        let files = |root: &Path| -> Vec<PathBuf> {
            TreeWalker::new(root)
                .entries()
                .map(Result::unwrap)
                .filter(|e| e.kind != EntryKind::Dir && root.join(&e.relative).is_file())
                .map(|e| e.relative)
                .collect()
        };

        let source_files = files(&self.source);
        assert_eq!(source_files, files(&self.dest));
        for rel in &source_files {
            assert_eq!(
                Fingerprint::from_file(&self.source.join(rel)).unwrap(),
                Fingerprint::from_file(&self.dest.join(rel)).unwrap(),
                "{} differs",
                rel.display()
            );
        }
    }
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_new_file_is_created() {
    let m = Mirror::new();
    m.write_source("a.txt", "hello");

    let entries = m.pass();

    assert_eq!(fs::read_to_string(m.dest.join("a.txt")).unwrap(), "hello");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, Action::Created);
    assert_eq!(entries[0].path, m.dest.join("a.txt"));
    assert!(entries[0].path.is_absolute());
}

#[test]
fn test_changed_file_is_updated() {
    let m = Mirror::new();
    m.write_dest("a.txt", "hello");
    m.write_source("a.txt", "world");

    let entries = m.pass();

    assert_eq!(fs::read_to_string(m.dest.join("a.txt")).unwrap(), "world");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, Action::Updated);
    assert_eq!(entries[0].path, m.dest.join("a.txt"));
}

#[test]
fn test_extra_file_is_deleted() {
    let m = Mirror::new();
    m.write_dest("b.txt", "stale");

    let entries = m.pass();

    assert!(!m.dest.join("b.txt").exists());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, Action::Deleted);
    assert_eq!(entries[0].path, m.dest.join("b.txt"));
}

#[test]
fn test_identical_trees_produce_no_entries() {
    let m = Mirror::new();
    m.write_source("a.txt", "same");
    m.write_dest("a.txt", "same");
    let log_before = fs::read_to_string(m.log.path()).unwrap();

    let entries = m.pass();

    assert!(entries.is_empty());
    assert_eq!(fs::read_to_string(m.log.path()).unwrap(), log_before);
    assert_eq!(fs::read_to_string(m.dest.join("a.txt")).unwrap(), "same");
}

#[test]
fn test_second_pass_is_idempotent() {
    let m = Mirror::new();
    m.write_source("a.txt", "a");
    m.write_source("docs/b.md", "b");
    m.write_dest("old/c.txt", "c");

    assert_eq!(m.pass().len(), 3);
    assert!(m.pass().is_empty());
}

#[test]
fn test_nested_tree_converges() {
    let m = Mirror::new();
    m.write_source("top.txt", "top");
    m.write_source("a/one.txt", "1");
    m.write_source("a/b/two.txt", "2");
    m.write_source("a/b/c/three.txt", "3");
    m.write_source(".hidden/secret", "s");
    fs::create_dir_all(m.source.join("empty/dir")).unwrap();
    m.write_dest("a/one.txt", "stale one");
    m.write_dest("a/b/extra.txt", "extra");
    m.write_dest("gone/deep/file.txt", "gone");

    m.pass();

    m.assert_converged();
    assert!(m.dest.join("empty/dir").is_dir());
    // Directory whose source counterpart never existed stays, emptied
    assert!(m.dest.join("gone/deep").is_dir());
}

#[test]
fn test_moved_file_is_created_then_deleted() {
    let m = Mirror::new();
    m.write_source("old/name.txt", "payload");
    m.pass();

    fs::create_dir_all(m.source.join("new")).unwrap();
    fs::rename(m.source.join("old/name.txt"), m.source.join("new/name.txt")).unwrap();
    let entries = m.pass();

    let summary: Vec<_> = entries.iter().map(|e| (e.action, e.path.clone())).collect();
    assert_eq!(
        summary,
        vec![
            (Action::Created, m.dest.join("new/name.txt")),
            (Action::Deleted, m.dest.join("old/name.txt")),
        ]
    );
    m.assert_converged();
}

#[test]
fn test_existing_log_lines_are_never_rewritten() {
    let m = Mirror::new();
    fs::write(
        m.log.path(),
        "[01/01/2020 00:00:00] Created: /somewhere/else.txt\n",
    )
    .unwrap();
    m.write_source("a.txt", "a");

    m.pass();
    fs::remove_file(m.source.join("a.txt")).unwrap();
    m.pass();

    let log = fs::read_to_string(m.log.path()).unwrap();
    let lines: Vec<_> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "[01/01/2020 00:00:00] Created: /somewhere/else.txt");
    assert!(lines[1].ends_with(&format!("] Created: {}", m.dest.join("a.txt").display())));
    assert!(lines[2].ends_with(&format!("] Deleted: {}", m.dest.join("a.txt").display())));
}

#[test]
fn test_empty_source_empties_destination_files() {
    let m = Mirror::new();
    m.write_dest("x/1.txt", "1");
    m.write_dest("x/2.txt", "2");

    let entries = m.pass();

    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.action == Action::Deleted));
    m.assert_converged();
}

#[test]
fn test_log_named_through_dot_components_keeps_its_history() {
    for log_arg in [
        "backup/../backup/mirror.log",
        "./backup/./mirror.log",
        "source/../backup/mirror.log",
    ] {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("source/a.txt"), "a");
        fs::create_dir(dir.path().join("backup")).unwrap();
        let history = "[01/01/2020 00:00:00] Created: /old/history\n";
        fs::write(dir.path().join("backup/mirror.log"), history).unwrap();

        let config = MirrorConfig::resolve(dir.path(), "source", "backup", log_arg, 1).unwrap();
        config.validate().unwrap();
        let reconciler = Reconciler::from_config(&config);

        reconciler.run(&mut ()).unwrap();
        let second = reconciler.run(&mut ()).unwrap();

        assert!(second.is_empty(), "{log_arg}: {second:?}");
        let log = fs::read_to_string(dir.path().join("backup/mirror.log")).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 2, "{log_arg}: {log}");
        assert_eq!(lines[0], "[01/01/2020 00:00:00] Created: /old/history");
        assert!(
            lines[1].ends_with(&format!(
                "] Created: {}",
                dir.path().join("backup/a.txt").display()
            )),
            "{log_arg}: {log}"
        );
    }
}

#[cfg(unix)]
#[test]
fn test_symlinks_converge_like_their_targets() {
    let m = Mirror::new();
    m.write_source("real.txt", "payload");
    std::os::unix::fs::symlink(m.source.join("real.txt"), m.source.join("alias.txt")).unwrap();
    m.write_dest("keep.txt", "x");
    std::os::unix::fs::symlink(m.dest.join("keep.txt"), m.dest.join("stray")).unwrap();

    let entries = m.pass();

    let summary: Vec<_> = entries.iter().map(|e| (e.action, e.path.clone())).collect();
    assert_eq!(
        summary,
        vec![
            (Action::Created, m.dest.join("alias.txt")),
            (Action::Created, m.dest.join("real.txt")),
            (Action::Deleted, m.dest.join("keep.txt")),
            (Action::Deleted, m.dest.join("stray")),
        ]
    );
    assert!(m.pass().is_empty());
    m.assert_converged();
}
