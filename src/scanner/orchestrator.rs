//! Library scan orchestration.
//!
//! One scan walks the library, groups files into models, compares them
//! with the stored records and applies the difference. All record-store
//! writes happen in one transaction that starts only after the walk has
//! finished. Rescan tasks are submitted after the commit, so every task
//! names a committed model row.
//!
//! If a submission fails, the fingerprints of the models whose tasks were
//! not delivered are cleared. The next scan sees them as changed and
//! submits them again.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use rusqlite::Connection;

use super::detector::{detect_changes, ScanDelta};
use super::filter::FileFilter;
use super::grouper::{group_files, GroupingRules};
use super::locks::ScanLocks;
use super::paths::{relative_path, CaseSensitivity};
use super::queue::{RescanQueue, RescanReason, RescanRequest};
use super::walker::{check_root, FileWalk, ScanWarning};
use crate::config::Config;
use crate::storage::{
    clear_model_fingerprint, create_model, delete_model, list_models, rename_model,
    update_model_fingerprint, Database, Library, NewModel,
};
use crate::telemetry::metrics;
use crate::{Error, Result};

/// Scanner settings derived from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub model_extensions: Vec<String>,
    pub bundle_markers: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub case: CaseSensitivity,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), host_default_case())
    }
}

/// Case behavior assumed when nothing was probed.
#[must_use]
pub const fn host_default_case() -> CaseSensitivity {
    if cfg!(any(windows, target_os = "macos")) {
        CaseSensitivity::Insensitive
    } else {
        CaseSensitivity::Sensitive
    }
}

impl ScanSettings {
    /// Take extensions, markers and exclusions from `config`.
    #[must_use]
    pub fn from_config(config: &Config, case: CaseSensitivity) -> Self {
        Self {
            model_extensions: config.model_extensions.clone(),
            bundle_markers: config.bundle_markers.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            case,
        }
    }

    /// Settle case sensitivity from `config`, probing `data_dir` if unset.
    ///
    /// The probe result is applied to every library, so it is only right
    /// for libraries on the same kind of filesystem as `data_dir`. Set
    /// `case_sensitive` explicitly for libraries mounted elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if probing is needed and fails.
    pub fn resolve(config: &Config) -> Result<Self> {
        let case = match config.case_sensitive {
            Some(flag) => CaseSensitivity::from_flag(flag),
            None => CaseSensitivity::probe(&config.data_dir)?,
        };
        Ok(Self::from_config(config, case))
    }

    /// Replace the comparison mode.
    #[must_use]
    pub const fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    fn rules_for(&self, root: &Path) -> Result<GroupingRules> {
        let filter =
            FileFilter::new(&self.model_extensions).with_excludes(root, &self.exclude_patterns)?;
        Ok(GroupingRules::new(filter, self.case).with_bundle_markers(&self.bundle_markers))
    }
}

/// Result of one library scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub library_id: i64,
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Models whose folder was renamed in case only.
    pub renamed: usize,
    /// Rescan tasks submitted.
    pub enqueued: usize,
    /// Paths of the models submitted for rescan.
    pub rescanned: Vec<String>,
    pub files_seen: usize,
    pub files_excluded: usize,
    /// Entries skipped because they could not be read.
    pub warnings: Vec<ScanWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives walk, grouping, change detection and the store update.
#[derive(Clone)]
pub struct LibraryScanner {
    db: Database,
    queue: Arc<dyn RescanQueue>,
    settings: ScanSettings,
    locks: ScanLocks,
}

impl LibraryScanner {
    /// Create a scanner writing to `db` and submitting to `queue`.
    #[must_use]
    pub fn new(db: Database, queue: Arc<dyn RescanQueue>, settings: ScanSettings) -> Self {
        Self {
            db,
            queue,
            settings,
            locks: ScanLocks::new(),
        }
    }

    /// Share a lock table with other scanners of the same store.
    #[must_use]
    pub fn with_locks(mut self, locks: ScanLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan one library.
    ///
    /// Waits for any running scan of the same library first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryUnavailable`] if the root is missing or
    /// unreadable, which leaves the store untouched. Returns a storage
    /// error if the update fails, which rolls it back. Returns
    /// [`Error::Queue`] if a rescan task could not be submitted. The writes
    /// stay committed in that case and the undelivered models are marked
    /// for re-detection.
    pub fn scan(&self, library: &Library) -> Result<ScanSummary> {
        let _guard = self.locks.lock(library.id);
        let span = tracing::info_span!("library_scan", library_id = library.id);
        let _entered = span.enter();

        let timer = Instant::now();
        let result = self.scan_locked(library);
        metrics::SCAN_DURATION.observe(timer.elapsed().as_secs_f64());

        match &result {
            Ok(summary) => {
                metrics::SCANS_TOTAL.with_label_values(&["ok"]).inc();
                tracing::info!(
                    library = %library.label(),
                    added = summary.added,
                    removed = summary.removed,
                    changed = summary.changed,
                    unchanged = summary.unchanged,
                    warnings = summary.warnings.len(),
                    "Library scan complete"
                );
            }
            Err(e @ Error::LibraryUnavailable { .. }) => {
                metrics::SCANS_TOTAL.with_label_values(&["unavailable"]).inc();
                tracing::warn!(error = %e, "Library scan aborted");
            }
            Err(e) => {
                metrics::SCANS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(error = %e, "Library scan failed");
            }
        }
        result
    }

    fn scan_locked(&self, library: &Library) -> Result<ScanSummary> {
        let started_at = Utc::now();
        let root = library.path.as_path();
        tracing::info!(root = %root.display(), "Starting library scan");

        check_root(root)?;
        let rules = self.settings.rules_for(root)?;

        let mut walk = FileWalk::new(root);
        let mut files = Vec::new();
        let mut files_seen = 0;
        let mut files_excluded = 0;
        for file in walk.by_ref() {
            files_seen += 1;
            if rules.filter.is_excluded(&file.path) {
                files_excluded += 1;
                continue;
            }
            if let Some(format) = rules.filter.detect_format(&file.path) {
                tracing::trace!(path = %file.path.display(), format, "Found model file");
            }
            files.push(file);
        }
        if let Some(reason) = walk.root_failure() {
            return Err(Error::library_unavailable(root, reason));
        }
        let warnings = walk.into_warnings();
        let unreadable: Vec<String> = warnings
            .iter()
            .filter(|w| w.hides_files())
            .filter_map(|w| relative_path(root, &w.path).ok())
            .collect();

        let candidates = group_files(root, &files, &rules)?;
        let case = self.settings.case;

        let (delta_counts, pending) = self.db.with_transaction(|conn| {
            let stored = list_models(conn, library.id)?;
            let mut delta = detect_changes(candidates, stored, case);
            delta.spare_unreadable(&unreadable, case);
            let counts = DeltaCounts::of(&delta);
            let pending = apply(conn, library.id, delta)?;
            Ok((counts, pending))
        })?;

        for (kind, count) in [
            ("added", delta_counts.added),
            ("changed", delta_counts.changed),
            ("renamed", delta_counts.renamed),
            ("removed", delta_counts.removed),
        ] {
            metrics::MODEL_CHANGES_TOTAL
                .with_label_values(&[kind])
                .inc_by(count as u64);
        }

        let rescanned = self.submit(pending)?;

        Ok(ScanSummary {
            library_id: library.id,
            added: delta_counts.added,
            removed: delta_counts.removed,
            changed: delta_counts.changed,
            unchanged: delta_counts.unchanged,
            renamed: delta_counts.renamed,
            enqueued: rescanned.len(),
            rescanned,
            files_seen,
            files_excluded,
            warnings,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Hand the requests to the queue in order.
    ///
    /// On the first rejection, the models of that request and of every
    /// later one lose their fingerprint so the next scan submits them again.
    fn submit(&self, pending: Vec<RescanRequest>) -> Result<Vec<String>> {
        let mut rescanned = Vec::with_capacity(pending.len());

        for (index, request) in pending.iter().enumerate() {
            if let Err(e) = self.queue.enqueue(request.clone()) {
                let undelivered: Vec<i64> = pending[index..].iter().map(|r| r.model_id).collect();
                self.forget_fingerprints(&undelivered);
                return Err(e);
            }

            metrics::RESCANS_ENQUEUED_TOTAL.inc();
            rescanned.push(request.model_path.clone());
        }
        Ok(rescanned)
    }

    fn forget_fingerprints(&self, model_ids: &[i64]) {
        let reset = self.db.with_transaction(|conn| {
            for id in model_ids {
                clear_model_fingerprint(conn, *id)?;
            }
            Ok(())
        });

        match reset {
            Ok(()) => tracing::warn!(
                models = model_ids.len(),
                "Rescan submission failed, models marked for re-detection"
            ),
            Err(e) => tracing::error!(
                error = %e,
                models = model_ids.len(),
                "Failed to mark undelivered models for re-detection"
            ),
        }
    }

    /// Scan on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scan`], plus an internal error if the task panics.
    pub async fn scan_async(&self, library: Library) -> Result<ScanSummary> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&library))
            .await
            .map_err(|e| Error::internal(format!("Scan task failed: {e}")))?
    }

    /// Scan several libraries in parallel.
    ///
    /// Failures are returned per library; one unavailable library does not
    /// stop the others. Results come back in input order.
    pub async fn scan_all(&self, libraries: &[Library]) -> Vec<(Library, Result<ScanSummary>)> {
        let mut tasks = JoinSet::new();
        for (index, library) in libraries.iter().cloned().enumerate() {
            let scanner = self.clone();
            tasks.spawn_blocking(move || {
                let result = scanner.scan(&library);
                (index, library, result)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => tracing::error!(error = %e, "Library scan task failed"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, library, result)| (library, result))
            .collect()
    }
}

impl std::fmt::Debug for LibraryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryScanner")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Write the delta and return one rescan request per added or changed model.
///
/// Runs inside the scan transaction; nothing is submitted here.
fn apply(conn: &Connection, library_id: i64, delta: ScanDelta) -> Result<Vec<RescanRequest>> {
    let mut pending = Vec::with_capacity(delta.rescan_count());

    for record in &delta.removed {
        delete_model(conn, record.id)?;
        tracing::info!(model = %record.path, "Model removed");
    }

    for renamed in &delta.renamed {
        rename_model(conn, renamed.record.id, renamed.current.path())?;
        tracing::info!(
            from = %renamed.record.path,
            to = %renamed.current.path(),
            "Model renamed"
        );
    }

    for model in delta.added {
        let record = create_model(
            conn,
            &NewModel {
                library_id,
                path: model.path(),
                fingerprint: Some(&model.fingerprint),
                file_count: model.file_count(),
            },
        )?;
        tracing::info!(model = %record.path, files = record.file_count, "Model added");
        pending.push(RescanRequest::new(
            library_id,
            record.id,
            record.path,
            RescanReason::Added,
        ));
    }

    for changed in delta.changed {
        if changed.is_renamed() {
            rename_model(conn, changed.record.id, changed.current.path())?;
        }
        update_model_fingerprint(
            conn,
            changed.record.id,
            &changed.current.fingerprint,
            changed.current.file_count(),
        )?;
        tracing::info!(model = %changed.current.path(), "Model changed");
        pending.push(RescanRequest::new(
            library_id,
            changed.record.id,
            changed.current.path(),
            RescanReason::Changed,
        ));
    }

    Ok(pending)
}

#[derive(Debug, Clone, Copy)]
struct DeltaCounts {
    added: usize,
    changed: usize,
    renamed: usize,
    removed: usize,
    unchanged: usize,
}

impl DeltaCounts {
    fn of(delta: &ScanDelta) -> Self {
        Self {
            added: delta.added.len(),
            changed: delta.changed.len(),
            renamed: delta.renamed.len(),
            removed: delta.removed.len(),
            unchanged: delta.unchanged,
        }
    }
}
