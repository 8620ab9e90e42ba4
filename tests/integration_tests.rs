//! Integration tests for void-sweep
//!
//! Each test builds a small directory tree in a temp dir and runs the
//! engine end to end against a catalog file in a second temp dir.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use void_sweep::catalog::{Catalog, FolderStatus};
use void_sweep::config::{Strategy, SweepConfig};
use void_sweep::progress::{ProgressSink, SilentProgress};
use void_sweep::walker::{ScanControl, ScanCoordinator, StartMode};
use void_sweep::{SweepEngine, SweepError};

/// root/empty1, root/empty2, root/has_file/file.txt,
/// root/nested/empty3, root/nested/has_file2/data.bin
fn sample_tree() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("empty1")).unwrap();
    fs::create_dir(root.join("empty2")).unwrap();
    fs::create_dir(root.join("has_file")).unwrap();
    fs::write(root.join("has_file/file.txt"), b"content").unwrap();
    fs::create_dir_all(root.join("nested/empty3")).unwrap();
    fs::create_dir_all(root.join("nested/has_file2")).unwrap();
    fs::write(root.join("nested/has_file2/data.bin"), [0u8; 64]).unwrap();
    dir
}

fn config(root: &Path, db: &TempDir, f: impl FnOnce(&mut SweepConfig)) -> SweepConfig {
    let mut config = SweepConfig::new(root);
    config.workers = 4;
    config.catalog_path = db.path().join("sweep.db");
    f(&mut config);
    config.validate().unwrap();
    config
}

/// Every directory under `root`, relative, root itself excluded
fn dirs_under(root: &Path) -> BTreeSet<PathBuf> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                out.insert(entry.path().strip_prefix(base).unwrap().to_path_buf());
                walk(base, &entry.path(), out);
            }
        }
    }
    let mut out = BTreeSet::new();
    walk(root, root, &mut out);
    out
}

/// Paths with `status`, relative to the canonical root
fn with_status(engine: &SweepEngine, status: FolderStatus) -> BTreeSet<PathBuf> {
    let root = engine.config().root_path.clone();
    engine
        .catalog()
        .folders(&engine.session().id)
        .unwrap()
        .into_iter()
        .filter(|f| f.status == status)
        .map(|f| Path::new(&f.path).strip_prefix(&root).unwrap().to_path_buf())
        .collect()
}

fn rel(paths: &[&str]) -> BTreeSet<PathBuf> {
    paths.iter().map(PathBuf::from).collect()
}

#[test]
fn test_delete_removes_exactly_the_empty_dirs() {
    let tree = sample_tree();
    let db = tempdir().unwrap();
    let before = dirs_under(tree.path());

    let engine = SweepEngine::new(config(tree.path(), &db, |c| c.delete_mode = true)).unwrap();
    let result = engine.run().unwrap();

    let report = result.cleanup.unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(
        with_status(&engine, FolderStatus::Deleted),
        rel(&["empty1", "empty2", "nested/empty3"])
    );

    let after = dirs_under(tree.path());
    assert_eq!(after.len(), before.len() - 3);
    assert!(tree.path().join("has_file/file.txt").exists());
    assert!(tree.path().join("nested/has_file2/data.bin").exists());
    assert!(tree.path().exists());
}

#[test]
fn test_min_depth_limits_removal() {
    let tree = sample_tree();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| {
        c.delete_mode = true;
        c.min_depth = 2;
    }))
    .unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.cleanup.unwrap().deleted, 1);
    assert!(!tree.path().join("nested/empty3").exists());
    assert!(tree.path().join("empty1").exists());
    assert!(tree.path().join("empty2").exists());

    // Shallow empties are still recorded as empty, just not acted on
    let stats = engine.catalog().stats(&engine.session().id).unwrap();
    assert_eq!(stats.empty, 2);
}

#[test]
fn test_worker_count_does_not_change_results() {
    let tree = sample_tree();
    fs::create_dir_all(tree.path().join("deep/a/b/c/d")).unwrap();
    fs::create_dir_all(tree.path().join("wide")).unwrap();
    for i in 0..20 {
        fs::create_dir(tree.path().join(format!("wide/{}", i))).unwrap();
    }

    let mut results = Vec::new();
    for workers in [1, 2, 4, 8] {
        for strategy in [Strategy::Bfs, Strategy::Dfs] {
            let db = tempdir().unwrap();
            let engine = SweepEngine::new(config(tree.path(), &db, |c| {
                c.workers = workers;
                c.strategy = strategy;
            }))
            .unwrap();
            engine.run().unwrap();
            results.push(with_status(&engine, FolderStatus::WouldDelete));
        }
    }

    assert_eq!(results[0].len(), 3 + 1 + 20);
    assert!(results.iter().all(|r| *r == results[0]));
}

#[test]
fn test_simulation_leaves_tree_unchanged() {
    let tree = sample_tree();
    let db = tempdir().unwrap();
    let before = dirs_under(tree.path());

    let engine = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    let result = engine.run().unwrap();

    let report = result.cleanup.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.would_delete, 3);
    assert_eq!(dirs_under(tree.path()), before);
    assert_eq!(
        with_status(&engine, FolderStatus::WouldDelete),
        rel(&["empty1", "empty2", "nested/empty3"])
    );
}

#[test]
fn test_every_reachable_dir_has_one_final_row() {
    let tree = sample_tree();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    engine.scan_only().unwrap();

    let folders = engine.catalog().folders(&engine.session().id).unwrap();
    // Root plus the six directories in the tree
    assert_eq!(folders.len(), 7);
    assert!(folders
        .iter()
        .all(|f| matches!(f.status, FolderStatus::Scanned | FolderStatus::Error)));

    let root = engine.config().root_key();
    let root_row = folders.iter().find(|f| f.path == root).unwrap();
    assert_eq!(root_row.depth, 0);
    assert_eq!(root_row.entry_count, 4);
}

#[test]
fn test_empty_root_is_never_removed() {
    let tree = tempdir().unwrap();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| c.delete_mode = true)).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.scan.empty, 1);
    assert_eq!(result.cleanup.unwrap().candidates, 0);
    assert!(tree.path().exists());

    let root = engine.config().root_key();
    let row = engine
        .catalog()
        .folder(&engine.session().id, &root)
        .unwrap()
        .unwrap();
    assert_eq!(row.status, FolderStatus::Scanned);
}

#[test]
fn test_hidden_files_count_as_content() {
    let tree = tempdir().unwrap();
    let db = tempdir().unwrap();
    fs::create_dir(tree.path().join("dotfile")).unwrap();
    fs::write(tree.path().join("dotfile/.keep"), b"").unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| c.delete_mode = true)).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.cleanup.unwrap().deleted, 0);
    assert!(tree.path().join("dotfile/.keep").exists());
}

#[cfg(unix)]
#[test]
fn test_symlink_only_dir_is_candidate_but_kept() {
    let tree = tempdir().unwrap();
    let outside = tempdir().unwrap();
    let db = tempdir().unwrap();
    fs::create_dir(tree.path().join("links")).unwrap();
    std::os::unix::fs::symlink(outside.path(), tree.path().join("links/out")).unwrap();
    fs::write(outside.path().join("precious"), b"keep me").unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| c.delete_mode = true)).unwrap();
    let result = engine.run().unwrap();

    // Scanned as empty: the link is not counted and not followed
    let root = engine.config().root_path.clone();
    let row = engine
        .catalog()
        .folder(&engine.session().id, &root.join("links").to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(row.entry_count, 0);
    assert_eq!(result.scan.scanned, 2);

    // The listing guard still sees the link and keeps the directory
    let report = result.cleanup.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.skipped_non_empty, 1);
    assert!(tree.path().join("links/out").exists());
    assert!(outside.path().join("precious").exists());
}

#[test]
fn test_cancel_then_resume_matches_uninterrupted_run() {
    let tree = sample_tree();

    let reference_db = tempdir().unwrap();
    let reference = SweepEngine::new(config(tree.path(), &reference_db, |_| {})).unwrap();
    reference.scan_only().unwrap();
    let expected = with_status(&reference, FolderStatus::Scanned);

    let db = tempdir().unwrap();
    let db_path = db.path().join("sweep.db");
    let first = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    first.control().cancel();
    let interrupted = first.run().unwrap();
    assert!(!interrupted.scan.completed);
    assert!(interrupted.cleanup.is_none());
    drop(first);

    let resumed = SweepEngine::resume(&db_path).unwrap();
    assert_eq!(resumed.session().id, interrupted.session_id);
    let result = resumed.run().unwrap();

    assert!(result.scan.completed);

    // Cleanup moved the empties on to WOULD_DELETE; together they are the
    // reference run's scanned set
    let empties = rel(&["empty1", "empty2", "nested/empty3"]);
    assert_eq!(with_status(&resumed, FolderStatus::WouldDelete), empties);
    let mut seen = with_status(&resumed, FolderStatus::Scanned);
    seen.extend(empties);
    assert_eq!(seen, expected);
    assert!(SweepEngine::resume(&db_path).is_err());
}

/// `fanout` subdirectories per level, `levels` deep
fn wide_tree(fanout: usize, levels: usize) -> TempDir {
    fn fill(dir: &Path, fanout: usize, levels: usize) {
        if levels == 0 {
            return;
        }
        for i in 0..fanout {
            let child = dir.join(format!("d{}", i));
            fs::create_dir(&child).unwrap();
            fill(&child, fanout, levels - 1);
        }
    }
    let dir = tempdir().unwrap();
    fill(dir.path(), fanout, levels);
    dir
}

/// Cancels the scan once `after` directories have been listed
struct CancelAfter {
    control: Arc<ScanControl>,
    after: u64,
    seen: AtomicU64,
}

impl ProgressSink for CancelAfter {
    fn scanned(&self) {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.control.cancel();
        }
    }
}

#[test]
fn test_mid_scan_cancel_resumes_from_pending_rows() {
    // 1 + 5 + 25 + 125 directories
    let tree = wide_tree(5, 3);
    let total = 156u64;

    let reference_db = tempdir().unwrap();
    let reference = SweepEngine::new(config(tree.path(), &reference_db, |_| {})).unwrap();
    let uninterrupted = reference.scan_only().unwrap();
    assert_eq!(uninterrupted.scanned, total);
    let expected = with_status(&reference, FolderStatus::Scanned);

    let db = tempdir().unwrap();
    let db_path = db.path().join("sweep.db");
    let narrow = |c: &mut SweepConfig| {
        c.workers = 2;
        c.capacity_multiplier = 2;
    };
    let first = SweepEngine::new(config(tree.path(), &db, narrow)).unwrap();
    let control = first.control();
    let first = first.with_progress(Arc::new(CancelAfter {
        control,
        after: 10,
        seen: AtomicU64::new(0),
    }));
    let interrupted = first.scan_only().unwrap();

    assert!(!interrupted.completed);
    assert!(interrupted.scanned >= 10);
    assert!(interrupted.scanned < total);
    assert!(interrupted.pending_remaining > 0);
    let pending = first.catalog().pending(&first.session().id).unwrap();
    assert_eq!(pending.len(), interrupted.pending_remaining);
    drop(first);

    let resumed = SweepEngine::resume(&db_path).unwrap();
    let finished = resumed.scan_only().unwrap();

    assert!(finished.completed);
    assert_eq!(finished.scanned, interrupted.pending_remaining as u64);
    assert_eq!(interrupted.scanned + finished.scanned, total);
    assert_eq!(with_status(&resumed, FolderStatus::Scanned), expected);
    assert_eq!(resumed.catalog().stats(&resumed.session().id).unwrap().pending, 0);
}

#[test]
fn test_resume_drops_vanished_pending_dirs() {
    let tree = sample_tree();
    let db = tempdir().unwrap();
    let mut cfg = config(tree.path(), &db, |_| {});
    cfg.workers = 1;

    // Hand-build an interrupted session: root scanned, children pending
    let catalog = Arc::new(Catalog::open(&cfg.catalog_path).unwrap());
    let session = catalog.create_session(&cfg).unwrap();
    let root = cfg.root_key();
    catalog.add_folder(&session.id, &root, 0).unwrap();
    catalog.record_scanned(&session.id, &root, 4).unwrap();
    for name in ["empty1", "empty2", "has_file", "nested"] {
        let path = cfg.root_path.join(name).to_string_lossy().into_owned();
        catalog.add_folder(&session.id, &path, 1).unwrap();
    }
    catalog.commit().unwrap();

    fs::remove_dir(tree.path().join("empty2")).unwrap();

    let coordinator = ScanCoordinator::new(
        Arc::new(cfg.clone()),
        Arc::clone(&catalog),
        session.id.clone(),
        Arc::new(SilentProgress),
    );
    let summary = coordinator.run(StartMode::Resume).unwrap();

    assert!(summary.completed);
    assert!(catalog
        .folder(&session.id, &cfg.root_path.join("empty2").to_string_lossy())
        .unwrap()
        .is_none());
    // empty1, has_file, nested, nested/empty3, nested/has_file2
    assert_eq!(summary.scanned, 5);
    assert_eq!(summary.errors, 0);
}

#[test]
fn test_content_appearing_after_scan_blocks_deletion() {
    let tree = sample_tree();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| c.delete_mode = true)).unwrap();
    assert!(engine.scan_only().unwrap().completed);

    fs::write(tree.path().join("empty1/late.txt"), b"arrived").unwrap();
    let report = engine.cleanup_only().unwrap();

    assert_eq!(report.deleted, 2);
    assert_eq!(report.skipped_non_empty, 1);
    assert!(tree.path().join("empty1/late.txt").exists());
}

#[test]
fn test_max_depth_and_excludes() {
    let tree = sample_tree();
    fs::create_dir_all(tree.path().join("node_modules/pkg")).unwrap();
    fs::create_dir_all(tree.path().join(".git/objects")).unwrap();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |c| {
        c.max_depth = 1;
        c.add_exclude_names(["node_modules".to_string()]);
    }))
    .unwrap();
    let result = engine.run().unwrap();

    let recorded: BTreeSet<PathBuf> = engine
        .catalog()
        .folders(&engine.session().id)
        .unwrap()
        .into_iter()
        .map(|f| PathBuf::from(f.path))
        .collect();
    let root = engine.config().root_path.clone();

    assert!(recorded.contains(&root.join("nested")));
    assert!(!recorded.contains(&root.join("nested/empty3")));
    assert!(!recorded.contains(&root.join("node_modules")));
    assert!(!recorded.contains(&root.join(".git")));

    // nested/empty3 was never scanned, so only the depth-1 empties qualify
    assert_eq!(
        with_status(&engine, FolderStatus::WouldDelete),
        rel(&["empty1", "empty2"])
    );
    assert!(result.scan.completed);
}

#[test]
fn test_cleanup_only_on_incomplete_session() {
    let tree = sample_tree();
    let db = tempdir().unwrap();

    let engine = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    engine.control().cancel();
    engine.scan_only().unwrap();

    assert!(matches!(
        engine.cleanup_only(),
        Err(SweepError::ScanIncomplete(_))
    ));
}

#[test]
fn test_session_listing() {
    let tree = sample_tree();
    let db = tempdir().unwrap();

    let first = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    first.run().unwrap();
    let first_id = first.session().id.clone();
    drop(first);

    let second = SweepEngine::new(config(tree.path(), &db, |_| {})).unwrap();
    second.control().cancel();
    second.run().unwrap();
    drop(second);

    let catalog = Catalog::open(&db.path().join("sweep.db")).unwrap();
    let sessions = catalog.list_sessions(10).unwrap();
    assert_eq!(sessions.len(), 2);

    let (done, stats) = sessions.iter().find(|(s, _)| s.id == first_id).unwrap();
    assert!(done.completed);
    assert_eq!(stats.would_delete, 3);
    assert_eq!(stats.scanned, 4);
    assert!(sessions.iter().any(|(s, st)| !s.completed && st.pending == 1));
}
