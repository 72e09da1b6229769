//! Recursive listing of every regular file under a library root.
//!
//! [`FileWalk`] is a lazy iterator over `walkdir`. Directories are never
//! yielded, whatever their name looks like. Entries that cannot be read
//! are skipped and remembered as [`ScanWarning`]s instead of ending the
//! walk.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{Error, Result};

/// A regular file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch (0 if unknown).
    pub modified_ns: i64,
}

/// An entry skipped during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: String,
    /// Set for links back to an ancestor; nothing below them was missed.
    #[serde(default)]
    pub symlink_cycle: bool,
}

impl ScanWarning {
    fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            symlink_cycle: false,
        }
    }

    /// Whether files may be missing from the walk because of this entry.
    #[must_use]
    pub const fn hides_files(&self) -> bool {
        !self.symlink_cycle
    }
}

impl From<ScanWarning> for Error {
    fn from(warning: ScanWarning) -> Self {
        Self::EntryUnreadable {
            path: warning.path,
            reason: warning.reason,
        }
    }
}

/// Check that a library root is an existing, listable directory.
///
/// # Errors
///
/// Returns [`Error::LibraryUnavailable`] otherwise.
pub fn check_root(root: &Path) -> Result<()> {
    let metadata =
        std::fs::metadata(root).map_err(|e| Error::library_unavailable(root, e.to_string()))?;

    if !metadata.is_dir() {
        return Err(Error::library_unavailable(root, "not a directory"));
    }

    std::fs::read_dir(root).map_err(|e| Error::library_unavailable(root, e.to_string()))?;
    Ok(())
}

/// Lazy walk over the regular files of one library.
///
/// Symlinks are followed so that linked model folders are indexed; link
/// cycles surface as warnings. Children are visited in file-name order.
pub struct FileWalk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    warnings: Vec<ScanWarning>,
    root_failure: Option<String>,
}

impl FileWalk {
    /// Start a walk at `root`. Nothing is read until the first `next()`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let inner = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        Self {
            root,
            inner,
            warnings: Vec::new(),
            root_failure: None,
        }
    }

    /// Entries skipped so far.
    #[must_use]
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Consume the walk, returning the skipped entries.
    #[must_use]
    pub fn into_warnings(self) -> Vec<ScanWarning> {
        self.warnings
    }

    /// Set when the root itself could not be read.
    #[must_use]
    pub fn root_failure(&self) -> Option<&str> {
        self.root_failure.as_deref()
    }

    fn record(&mut self, err: &walkdir::Error) {
        if err.depth() == 0 {
            tracing::warn!(root = %self.root.display(), error = %err, "Library root unreadable");
            self.root_failure = Some(err.to_string());
            return;
        }

        let path = err
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        let warning = match err.loop_ancestor() {
            Some(ancestor) => ScanWarning {
                symlink_cycle: true,
                ..ScanWarning::new(path, format!("symlink cycle back to {}", ancestor.display()))
            },
            None => ScanWarning::new(path, err.to_string()),
        };

        tracing::warn!(
            path = %warning.path.display(),
            reason = %warning.reason,
            "Skipping unreadable entry"
        );
        self.warnings.push(warning);
    }
}

impl Iterator for FileWalk {
    type Item = DiscoveredFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.record(&e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    return Some(DiscoveredFile {
                        path: entry.into_path(),
                        size: metadata.len(),
                        modified_ns: metadata
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)),
                    });
                }
                Err(e) => self.record(&e),
            }
        }
    }
}

impl std::fmt::Debug for FileWalk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWalk")
            .field("root", &self.root)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

/// Absolute paths of every regular file under `root`.
///
/// # Errors
///
/// Returns [`Error::LibraryUnavailable`] if the root is missing or unreadable.
pub fn filenames_on_disk(root: &Path) -> Result<Vec<PathBuf>> {
    check_root(root)?;

    let mut walk = FileWalk::new(root);
    let paths: Vec<PathBuf> = walk.by_ref().map(|f| f.path).collect();

    if let Some(reason) = walk.root_failure() {
        return Err(Error::library_unavailable(root, reason));
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative.as_bytes()).unwrap();
    }

    #[test]
    fn test_yields_files_not_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "wrong.stl/file.stl");

        let paths = filenames_on_disk(tmp.path()).unwrap();
        assert!(!paths.contains(&tmp.path().join("wrong.stl")));
        assert!(paths.contains(&tmp.path().join("wrong.stl/file.stl")));
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_empty_directories_yield_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();

        assert!(filenames_on_disk(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_collects_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("model")).unwrap();
        fs::write(tmp.path().join("model/part.stl"), b"solid part").unwrap();

        let files: Vec<_> = FileWalk::new(tmp.path()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 10);
        assert!(files[0].modified_ns > 0);
    }

    #[test]
    fn test_order_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        for name in ["b/2.stl", "a/1.stl", "c/3.stl", "a/0.obj"] {
            touch(tmp.path(), name);
        }

        let first: Vec<_> = FileWalk::new(tmp.path()).map(|f| f.path).collect();
        let second: Vec<_> = FileWalk::new(tmp.path()).map(|f| f.path).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], tmp.path().join("a/0.obj"));
    }

    #[test]
    fn test_missing_root_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = filenames_on_disk(&missing).unwrap_err();
        assert!(matches!(err, Error::LibraryUnavailable { .. }));
    }

    #[test]
    fn test_file_root_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("model.stl");
        fs::write(&file, b"x").unwrap();

        let err = check_root(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_a_warning() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "model/part.stl");
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("model/loop")).unwrap();

        let mut walk = FileWalk::new(tmp.path());
        let paths: Vec<_> = walk.by_ref().map(|f| f.path).collect();

        assert_eq!(paths, vec![tmp.path().join("model/part.stl")]);
        assert_eq!(walk.warnings().len(), 1);
        assert!(walk.warnings()[0].reason.contains("symlink cycle"));
        assert!(!walk.warnings()[0].hides_files());
        assert!(walk.root_failure().is_none());
    }

    #[test]
    fn test_warning_converts_to_entry_unreadable() {
        let warning = ScanWarning::new("/lib/x.stl", "permission denied");
        assert!(warning.hides_files());
        let err: Error = warning.into();
        assert!(!err.is_fatal());
    }
}
