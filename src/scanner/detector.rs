//! Change detection between the models on disk and the stored records.

use std::collections::HashMap;

use blake3::Hasher;

use super::grouper::{CandidateModel, MemberFile};
use super::paths::CaseSensitivity;
use crate::storage::ModelRecord;

/// Digest over member names, sizes and modification times.
///
/// The input order does not matter.
#[must_use]
pub fn fingerprint(files: &[MemberFile]) -> String {
    let mut entries: Vec<&MemberFile> = files.iter().collect();
    entries.sort_by(|a, b| {
        a.relative_path
            .cmp(&b.relative_path)
            .then(a.size.cmp(&b.size))
            .then(a.modified_ns.cmp(&b.modified_ns))
    });

    let mut hasher = Hasher::new();
    for entry in entries {
        hasher.update(entry.relative_path.as_bytes());
        hasher.update(&[0]);
        hasher.update(&entry.size.to_le_bytes());
        hasher.update(&entry.modified_ns.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// A candidate together with its computed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintedModel {
    pub candidate: CandidateModel,
    pub fingerprint: String,
}

impl FingerprintedModel {
    fn new(candidate: CandidateModel) -> Self {
        let fingerprint = fingerprint(&candidate.files);
        Self {
            candidate,
            fingerprint,
        }
    }

    /// Relative path of the model.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.candidate.path
    }

    /// Number of member files.
    #[must_use]
    pub fn file_count(&self) -> i64 {
        i64::try_from(self.candidate.files.len()).unwrap_or(i64::MAX)
    }
}

/// A stored model paired with what is on disk now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedModel {
    pub record: ModelRecord,
    pub current: FingerprintedModel,
}

impl ChangedModel {
    /// The folder spelling on disk differs from the stored path.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.record.path != self.current.path()
    }
}

/// What one scan pass found. Unchanged models are only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDelta {
    pub added: Vec<FingerprintedModel>,
    pub changed: Vec<ChangedModel>,
    /// Same files, but the folder was renamed in case only.
    pub renamed: Vec<ChangedModel>,
    pub removed: Vec<ModelRecord>,
    pub unchanged: usize,
}

impl ScanDelta {
    /// True when nothing has to be written or rescanned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.renamed.is_empty()
            && self.removed.is_empty()
    }

    /// Keep stored models that overlap an unreadable entry as they are.
    ///
    /// `unreadable` holds library-relative paths. A stored model at, above
    /// or below one of them may only look changed or gone because part of
    /// its folder could not be listed, so it is neither updated nor
    /// removed and counts as unchanged.
    pub fn spare_unreadable(&mut self, unreadable: &[String], case: CaseSensitivity) {
        if unreadable.is_empty() {
            return;
        }
        let folded: Vec<String> = unreadable
            .iter()
            .map(|path| case.fold(path).into_owned())
            .collect();
        let spared = |path: &str| {
            let key = case.fold(path);
            folded.iter().any(|entry| overlaps(&key, entry))
        };

        let before = self.changed.len() + self.removed.len();
        self.changed.retain(|m| !spared(&m.record.path));
        self.removed.retain(|r| !spared(&r.path));
        let kept = before - self.changed.len() - self.removed.len();

        if kept > 0 {
            tracing::warn!(models = kept, "Left models with unreadable entries untouched");
        }
        self.unchanged += kept;
    }

    /// Number of rescan tasks this delta requires.
    #[must_use]
    pub fn rescan_count(&self) -> usize {
        self.added.len() + self.changed.len()
    }
}

/// Compare candidates from disk with stored models.
///
/// Paths are matched under `case`. A stored model without a fingerprint
/// has never been scanned and always counts as changed. If several stored
/// rows fold to the same path, the first one (by path) is matched and the
/// others are reported as removed.
#[must_use]
pub fn detect_changes(
    candidates: Vec<CandidateModel>,
    stored: Vec<ModelRecord>,
    case: CaseSensitivity,
) -> ScanDelta {
    let mut delta = ScanDelta::default();

    let mut stored_sorted = stored;
    stored_sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut by_key: HashMap<String, ModelRecord> = HashMap::with_capacity(stored_sorted.len());
    for record in stored_sorted {
        let key = case.fold(&record.path).into_owned();
        if by_key.contains_key(&key) {
            delta.removed.push(record);
        } else {
            by_key.insert(key, record);
        }
    }

    for candidate in candidates {
        let current = FingerprintedModel::new(candidate);
        let key = case.fold(current.path()).into_owned();

        match by_key.remove(&key) {
            None => delta.added.push(current),
            Some(record) => {
                let model = ChangedModel { record, current };
                let same_files =
                    model.record.fingerprint.as_deref() == Some(model.current.fingerprint.as_str());
                match (same_files, model.is_renamed()) {
                    (true, false) => delta.unchanged += 1,
                    (true, true) => delta.renamed.push(model),
                    (false, _) => delta.changed.push(model),
                }
            }
        }
    }

    delta.removed.extend(by_key.into_values());

    delta
        .added
        .sort_by_cached_key(|m| case.fold(m.path()).into_owned());
    delta
        .changed
        .sort_by_cached_key(|m| case.fold(m.current.path()).into_owned());
    delta
        .renamed
        .sort_by_cached_key(|m| case.fold(m.current.path()).into_owned());
    delta
        .removed
        .sort_by_cached_key(|r| case.fold(&r.path).into_owned());

    tracing::debug!(
        added = delta.added.len(),
        changed = delta.changed.len(),
        renamed = delta.renamed.len(),
        removed = delta.removed.len(),
        unchanged = delta.unchanged,
        "Detected model changes"
    );
    delta
}

/// `a` and `b` are the same path or one lies inside the other.
fn overlaps(a: &str, b: &str) -> bool {
    let inside = |inner: &str, outer: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    a == b || inside(a, b) || inside(b, a)
}
