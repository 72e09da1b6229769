//! Integration tests for library scanning against real directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use modelshelf::scanner::{
    filenames_on_disk, CaseSensitivity, LibraryScanner, RecordingQueue, RescanReason,
    ScanSettings,
};
use modelshelf::storage::{create_library, init_storage, list_models, Database, Library};
use modelshelf::Error;
use tempfile::TempDir;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, relative.as_bytes()).unwrap();
}

type Fixture = (TempDir, Database, Library, Arc<RecordingQueue>, LibraryScanner);

fn setup(case: CaseSensitivity) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("library");
    fs::create_dir_all(&root).unwrap();

    let db = Database::open(tmp.path().join("test.db")).unwrap();
    init_storage(&db).unwrap();
    let library = db
        .with_conn(|conn| create_library(conn, &root, Some("test")))
        .unwrap();

    let queue = Arc::new(RecordingQueue::new());
    let scanner = LibraryScanner::new(
        db.clone(),
        queue.clone(),
        ScanSettings::default().with_case(case),
    );
    (tmp, db, library, queue, scanner)
}

fn stored_paths(db: &Database, library: &Library) -> Vec<String> {
    db.with_conn(|conn| list_models(conn, library.id))
        .unwrap()
        .into_iter()
        .map(|m| m.path)
        .collect()
}

/// Two models, one nested, both queued on the first scan.
#[test]
fn test_first_scan_finds_flat_and_nested_models() {
    let (_tmp, db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model_one/part_1.obj");
    touch(&library.path, "model_one/part_2.obj");
    touch(&library.path, "subfolder/model_two/part_one.stl");

    let summary = scanner.scan(&library).unwrap();

    assert_eq!(summary.added, 2);
    assert_eq!(summary.enqueued, 2);
    assert_eq!(
        stored_paths(&db, &library),
        vec!["model_one", "subfolder/model_two"]
    );

    let mut queued: Vec<String> = queue.requests().into_iter().map(|r| r.model_path).collect();
    queued.sort();
    assert_eq!(queued, vec!["model_one", "subfolder/model_two"]);
}

#[test]
fn test_rescan_without_changes_enqueues_nothing() {
    let (_tmp, _db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model_one/part_1.obj");
    touch(&library.path, "other/thing.3mf");

    scanner.scan(&library).unwrap();
    queue.take();

    let summary = scanner.scan(&library).unwrap();
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.enqueued, 0);
    assert!(queue.is_empty());
}

/// After `model_one` is recorded, only the new model is queued.
#[test]
fn test_only_new_models_enqueue_after_first_scan() {
    let (_tmp, _db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model_one/part_1.obj");
    scanner.scan(&library).unwrap();
    queue.take();

    touch(&library.path, "subfolder/model_two/part_one.stl");
    let summary = scanner.scan(&library).unwrap();

    assert_eq!(summary.added, 1);
    assert_eq!(summary.unchanged, 1);
    let requests = queue.take();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model_path, "subfolder/model_two");
    assert_eq!(requests[0].reason, RescanReason::Added);
}

#[test]
fn test_thingiverse_bundle_is_one_model() {
    let (_tmp, db, library, _queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "thing_12345/files/body.stl");
    touch(&library.path, "thing_12345/files/lid.stl");
    touch(&library.path, "thing_12345/images/render.png");
    touch(&library.path, "thing_12345/README.txt");

    let summary = scanner.scan(&library).unwrap();
    assert_eq!(summary.added, 1);

    let models = db.with_conn(|conn| list_models(conn, library.id)).unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].path, "thing_12345");
    assert_eq!(models[0].file_count, 4);
}

#[test]
fn test_directory_named_like_model_file() {
    let (_tmp, db, library, _queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model/wrong.stl/part.stl");

    let files = filenames_on_disk(&library.path).unwrap();
    assert_eq!(files, vec![library.path.join("model/wrong.stl/part.stl")]);

    scanner.scan(&library).unwrap();
    assert_eq!(stored_paths(&db, &library), vec!["model/wrong.stl"]);
}

fn member_count(db: &Database, library: &Library) -> i64 {
    db.with_conn(|conn| list_models(conn, library.id))
        .unwrap()
        .iter()
        .map(|m| m.file_count)
        .sum()
}

#[test]
fn test_case_variants_follow_case_mode() {
    let (tmp, db, library, _queue, scanner) = setup(CaseSensitivity::Sensitive);
    if CaseSensitivity::probe(tmp.path()).unwrap() == CaseSensitivity::Insensitive {
        // The host cannot hold the three variants side by side.
        return;
    }
    touch(&library.path, "model/file.obj");
    touch(&library.path, "model/file.OBJ");
    touch(&library.path, "model/file.Obj");
    assert_eq!(filenames_on_disk(&library.path).unwrap().len(), 3);

    scanner.scan(&library).unwrap();
    assert_eq!(member_count(&db, &library), 3);

    let (_other_tmp, other_db, _, _, _) = setup(CaseSensitivity::Insensitive);
    let same_root = other_db
        .with_conn(|conn| create_library(conn, &library.path, None))
        .unwrap();
    let insensitive = LibraryScanner::new(
        other_db.clone(),
        Arc::new(RecordingQueue::new()),
        ScanSettings::default().with_case(CaseSensitivity::Insensitive),
    );
    insensitive.scan(&same_root).unwrap();
    assert_eq!(member_count(&other_db, &same_root), 1);
}

#[test]
fn test_missing_library_leaves_records() {
    let (_tmp, db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model_one/part_1.obj");
    scanner.scan(&library).unwrap();
    queue.take();

    fs::remove_dir_all(&library.path).unwrap();
    let err = scanner.scan(&library).unwrap_err();

    assert!(matches!(err, Error::LibraryUnavailable { .. }));
    assert!(err.is_fatal());
    assert_eq!(stored_paths(&db, &library), vec!["model_one"]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_concurrent_scans_enqueue_once() {
    let (_tmp, db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model_one/part_1.obj");
    touch(&library.path, "model_two/part.stl");

    let results = scanner.scan_all(&[library.clone(), library.clone()]).await;
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    assert_eq!(queue.len(), 2);
    assert_eq!(stored_paths(&db, &library).len(), 2);
}

#[cfg(unix)]
#[test]
fn test_symlink_cycle_is_a_warning() {
    let (_tmp, db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "model/part.stl");
    touch(&library.path, "other/piece.obj");
    std::os::unix::fs::symlink(&library.path, library.path.join("model/loop")).unwrap();

    let first = scanner.scan(&library).unwrap();
    assert!(!first.warnings.is_empty());
    assert_eq!(first.added, 2);
    queue.take();

    let summary = scanner.scan(&library).unwrap();
    assert!(!summary.warnings.is_empty());
    assert!(summary.warnings.iter().all(|w| !w.hides_files()));
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.removed, 0);
    assert!(queue.is_empty());
    assert_eq!(stored_paths(&db, &library), vec!["model", "other"]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subfolder_keeps_stored_models() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, db, library, queue, scanner) = setup(CaseSensitivity::Sensitive);
    touch(&library.path, "open/part.stl");
    touch(&library.path, "shelf/locked/part.stl");
    touch(&library.path, "shelf/spare/part.stl");
    scanner.scan(&library).unwrap();
    queue.take();
    let before = db.with_conn(|conn| list_models(conn, library.id)).unwrap();
    assert_eq!(before.len(), 3);

    let locked = library.path.join("shelf/locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running as a user that ignores permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = scanner.scan(&library);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let summary = result.unwrap();
    assert!(!summary.warnings.is_empty());
    assert!(summary.warnings.iter().any(|w| w.path.ends_with("shelf/locked")));
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.changed, 0);
    assert!(queue.is_empty());

    let after = db.with_conn(|conn| list_models(conn, library.id)).unwrap();
    assert_eq!(after, before);
}
