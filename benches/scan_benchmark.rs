//! Performance benchmarks for Modelshelf scanning
//!
//! **Benchmarks Included:**
//! - `walk_and_group`: filesystem walk plus grouping at 100 and 1000 models
//! - `detect_unchanged`: change detection when every model is already stored
//! - `full_rescan`: end-to-end scan of an unchanged library
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                        # Run all benchmarks
//! cargo bench -- walk_and_group      # Walk + group only
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modelshelf::scanner::{
    detect_changes, fingerprint, group_files, CaseSensitivity, FileFilter, FileWalk,
    GroupingRules, LibraryScanner, RecordingQueue, ScanSettings,
};
use modelshelf::storage::{create_library, init_storage, Database, ModelRecord};
use tempfile::TempDir;

/// Build a library with `models` folders, alternating flat, nested and bundled layouts.
fn create_library_tree(models: usize) -> TempDir {
    let tmp = TempDir::new().expect("failed to create temp dir");
    for i in 0..models {
        let files: &[&str] = match i % 3 {
            0 => &["part_1.stl", "part_2.stl", "notes.txt"],
            1 => &["nested/a.obj", "nested/b.obj"],
            _ => &["files/body.3mf", "images/render.png", "README.txt"],
        };
        for file in files {
            let path = tmp.path().join(format!("model_{i:05}")).join(file);
            fs::create_dir_all(path.parent().expect("file has parent")).expect("mkdir");
            fs::write(path, b"solid bench").expect("write");
        }
    }
    tmp
}

fn rules(root: &Path) -> GroupingRules {
    GroupingRules::new(
        FileFilter::defaults_for(root).expect("filter"),
        CaseSensitivity::Sensitive,
    )
}

fn bench_walk_and_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk_and_group");
    group.sample_size(10);

    for models in [100, 1000] {
        let tmp = create_library_tree(models);
        let rules = rules(tmp.path());

        group.bench_with_input(BenchmarkId::from_parameter(models), &models, |b, _| {
            b.iter(|| {
                let files: Vec<_> = FileWalk::new(tmp.path()).collect();
                let candidates = group_files(tmp.path(), &files, &rules).expect("group");
                black_box(candidates.len())
            });
        });
    }
    group.finish();
}

fn bench_detect_unchanged(c: &mut Criterion) {
    let tmp = create_library_tree(1000);
    let rules = rules(tmp.path());
    let files: Vec<_> = FileWalk::new(tmp.path()).collect();
    let candidates = group_files(tmp.path(), &files, &rules).expect("group");

    let stored: Vec<ModelRecord> = candidates
        .iter()
        .zip(1..)
        .map(|(candidate, id)| ModelRecord {
            id,
            library_id: 1,
            path: candidate.path.clone(),
            fingerprint: Some(fingerprint(&candidate.files)),
            file_count: 0,
            created_at: 0,
            updated_at: 0,
        })
        .collect();

    c.bench_function("detect_unchanged", |b| {
        b.iter(|| {
            let delta = detect_changes(
                candidates.clone(),
                stored.clone(),
                CaseSensitivity::Sensitive,
            );
            black_box(delta.unchanged)
        });
    });
}

fn bench_full_rescan(c: &mut Criterion) {
    let tmp = create_library_tree(300);
    let db_dir = TempDir::new().expect("failed to create temp dir");
    let db = Database::open(db_dir.path().join("bench.db")).expect("failed to open database");
    init_storage(&db).expect("init storage");
    let library = db
        .with_conn(|conn| create_library(conn, tmp.path(), None))
        .expect("create library");

    let scanner = LibraryScanner::new(
        db,
        Arc::new(RecordingQueue::new()),
        ScanSettings::default().with_case(CaseSensitivity::Sensitive),
    );
    scanner.scan(&library).expect("initial scan");

    let mut group = c.benchmark_group("full_rescan");
    group.sample_size(10);
    group.bench_function("300_models", |b| {
        b.iter(|| black_box(scanner.scan(&library).expect("rescan").unchanged));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_walk_and_group,
    bench_detect_unchanged,
    bench_full_rescan
);
criterion_main!(benches);
