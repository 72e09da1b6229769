//! Path normalization and case-aware comparison.
//!
//! Library-relative paths are always forward-slash separated strings so
//! stored records compare the same on every host. Whether `Model` and
//! `model` name the same folder is a property of the filesystem, carried
//! here as [`CaseSensitivity`].

use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How two relative paths are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    /// `file.obj` and `file.OBJ` are different entries.
    Sensitive,
    /// `file.obj` and `file.OBJ` are the same entry.
    Insensitive,
}

impl CaseSensitivity {
    /// Build from a config flag.
    #[must_use]
    pub const fn from_flag(case_sensitive: bool) -> Self {
        if case_sensitive {
            Self::Sensitive
        } else {
            Self::Insensitive
        }
    }

    /// Comparison key for a path or name.
    #[must_use]
    pub fn fold<'a>(self, value: &'a str) -> Cow<'a, str> {
        match self {
            Self::Sensitive => Cow::Borrowed(value),
            Self::Insensitive => Cow::Owned(value.to_lowercase()),
        }
    }

    /// Compare two paths or names under this mode.
    #[must_use]
    pub fn same_path(self, a: &str, b: &str) -> bool {
        self.fold(a) == self.fold(b)
    }

    /// Detect the behavior of the filesystem holding `dir`.
    ///
    /// Writes a mixed-case probe file, checks whether its case-swapped name
    /// resolves, then removes it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the probe file cannot be created.
    pub fn probe(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let name = format!(".CaseProbe-{}", uuid::Uuid::new_v4().simple());
        let probe = dir.join(&name);
        let swapped = dir.join(swap_case(&name));

        fs::write(&probe, b"")?;
        let mode = if swapped.exists() {
            Self::Insensitive
        } else {
            Self::Sensitive
        };
        if let Err(e) = fs::remove_file(&probe) {
            tracing::warn!(path = %probe.display(), error = %e, "Failed to remove case probe");
        }

        tracing::debug!(dir = %dir.display(), ?mode, "Probed filesystem case sensitivity");
        Ok(mode)
    }
}

fn swap_case(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                c.to_uppercase().next().unwrap_or(c)
            }
        })
        .collect()
}

/// Path of `path` relative to `root`, joined with `/`.
///
/// # Errors
///
/// Returns [`Error::InvalidPathKind`] if `path` is not strictly below `root`.
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let invalid = || Error::InvalidPathKind {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let rest = path.strip_prefix(root).map_err(|_| invalid())?;

    let mut segments = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_string_lossy()),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments.join("/"))
}

/// Split a relative path into its segments.
pub fn segments(relative: &str) -> impl Iterator<Item = &str> {
    relative.split('/').filter(|s| !s.is_empty())
}
