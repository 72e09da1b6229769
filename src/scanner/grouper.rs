//! Partitioning of a flat file list into models.
//!
//! Files are arranged into a folder tree keyed by the case-folded name,
//! then each top-level folder is resolved:
//!
//! 1. no model file anywhere below it: ignored;
//! 2. it has a bundle marker child folder (`files/`, `images/`): one model;
//! 3. it has model files directly inside: one model for the whole subtree;
//! 4. otherwise each child folder is resolved the same way, so
//!    `subfolder/model_two` becomes its own model.
//!
//! Files directly under the library root belong to no model.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use super::filter::FileFilter;
use super::paths::{relative_path, segments, CaseSensitivity};
use super::walker::DiscoveredFile;
use crate::config::DEFAULT_BUNDLE_MARKERS;
use crate::Result;

/// A file belonging to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFile {
    /// Path relative to the model folder, forward-slash separated.
    pub relative_path: String,
    pub size: u64,
    pub modified_ns: i64,
}

/// A model as seen on disk during this scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateModel {
    /// Path relative to the library root.
    pub path: String,
    /// Every file under the model folder, sorted by comparison key.
    pub files: Vec<MemberFile>,
}

/// Settings that decide where model boundaries are.
#[derive(Debug, Clone)]
pub struct GroupingRules {
    pub filter: FileFilter,
    pub bundle_markers: Vec<String>,
    pub case: CaseSensitivity,
}

impl GroupingRules {
    /// Rules with the given filter and default bundle markers.
    #[must_use]
    pub fn new(filter: FileFilter, case: CaseSensitivity) -> Self {
        Self {
            filter,
            bundle_markers: DEFAULT_BUNDLE_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            case,
        }
    }

    /// Replace the bundle marker folder names.
    #[must_use]
    pub fn with_bundle_markers<S: AsRef<str>>(mut self, markers: &[S]) -> Self {
        self.bundle_markers = markers.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    fn is_marker(&self, key: &str) -> bool {
        self.bundle_markers
            .iter()
            .any(|m| self.case.fold(m) == key)
    }
}

struct FileNode {
    name: String,
    size: u64,
    modified_ns: i64,
}

impl FileNode {
    fn new(name: &str, file: &DiscoveredFile) -> Self {
        Self {
            name: name.to_string(),
            size: file.size,
            modified_ns: file.modified_ns,
        }
    }
}

#[derive(Default)]
struct DirNode {
    name: String,
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, FileNode>,
    /// Model files anywhere in this subtree.
    model_files: usize,
    /// Model files directly in this folder.
    loose_model_files: usize,
}

impl DirNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn insert(&mut self, parts: &[&str], file: &DiscoveredFile, rules: &GroupingRules) {
        let Some((name, dirs)) = parts.split_last() else {
            return;
        };

        let leaf = self.descend(dirs, rules, false);
        match leaf.files.entry(rules.case.fold(name).into_owned()) {
            Entry::Occupied(mut slot) => {
                // Case-variant spellings settle on the smallest one.
                if *name < slot.get().name.as_str() {
                    slot.insert(FileNode::new(name, file));
                }
                tracing::debug!(name = %name, "Collapsed case-variant file name");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(FileNode::new(name, file));
            }
        }

        if rules.filter.is_model_file(Path::new(name)) {
            leaf.loose_model_files += 1;
            self.descend(dirs, rules, true);
        }
    }

    /// Walk (creating as needed) to the folder at `dirs`.
    fn descend(&mut self, dirs: &[&str], rules: &GroupingRules, count_model: bool) -> &mut Self {
        let mut node = self;
        for dir in dirs {
            let child = node
                .dirs
                .entry(rules.case.fold(dir).into_owned())
                .or_insert_with(|| Self::named(dir));
            if *dir < child.name.as_str() {
                child.name = (*dir).to_string();
            }
            if count_model {
                child.model_files += 1;
            }
            node = child;
        }
        node
    }

    fn is_bundle(&self, rules: &GroupingRules) -> bool {
        self.dirs.keys().any(|key| rules.is_marker(key))
    }

    fn collect_members(&self, prefix: &str, out: &mut Vec<MemberFile>) {
        for file in self.files.values() {
            out.push(MemberFile {
                relative_path: join(prefix, &file.name),
                size: file.size,
                modified_ns: file.modified_ns,
            });
        }
        for dir in self.dirs.values() {
            dir.collect_members(&join(prefix, &dir.name), out);
        }
    }

    fn resolve(&self, prefix: &str, rules: &GroupingRules, out: &mut Vec<CandidateModel>) {
        if self.model_files == 0 {
            return;
        }

        let path = join(prefix, &self.name);
        if self.is_bundle(rules) || self.loose_model_files > 0 {
            let mut files = Vec::new();
            self.collect_members("", &mut files);
            files.sort_by_cached_key(|f| rules.case.fold(&f.relative_path).into_owned());
            out.push(CandidateModel { path, files });
            return;
        }

        for child in self.dirs.values() {
            child.resolve(&path, rules, out);
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Group walked files into candidate models.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidPathKind`] if a file is not under `root`.
pub fn group_files(
    root: &Path,
    files: &[DiscoveredFile],
    rules: &GroupingRules,
) -> Result<Vec<CandidateModel>> {
    let mut tree = DirNode::default();

    for file in files {
        let relative = relative_path(root, &file.path)?;
        let parts: Vec<&str> = segments(&relative).collect();
        if parts.len() < 2 {
            tracing::debug!(path = %relative, "File at library root belongs to no model");
            continue;
        }
        tree.insert(&parts, file, rules);
    }

    let mut models = Vec::new();
    for top in tree.dirs.values() {
        top.resolve("", rules, &mut models);
    }
    models.sort_by_cached_key(|m| rules.case.fold(&m.path).into_owned());

    tracing::debug!(
        files = files.len(),
        models = models.len(),
        "Grouped files into models"
    );
    Ok(models)
}
