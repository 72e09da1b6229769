//! Data models for storage operations.
//!
//! This module defines the records kept in the store:
//! - Libraries (scanned root directories)
//! - Models (one printable item inside a library)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0)
}

/// A tracked library root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Database primary key.
    pub id: i64,

    /// Absolute path of the library root.
    pub path: PathBuf,

    /// Optional display name.
    pub name: Option<String>,

    /// Unix timestamp when the library was registered.
    pub created_at: i64,
}

impl Library {
    /// Name to show in logs: the display name or the root path.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A stored model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Database primary key.
    pub id: i64,

    /// Owning library.
    pub library_id: i64,

    /// Path relative to the library root, forward-slash separated.
    pub path: String,

    /// Fingerprint from the last scan; `None` if never scanned.
    pub fingerprint: Option<String>,

    /// Number of member files at the last scan.
    pub file_count: i64,

    /// Unix timestamp of creation.
    pub created_at: i64,

    /// Unix timestamp of the last fingerprint update.
    pub updated_at: i64,
}

/// Values needed to insert a model row.
#[derive(Debug, Clone)]
pub struct NewModel<'a> {
    pub library_id: i64,
    pub path: &'a str,
    pub fingerprint: Option<&'a str>,
    pub file_count: i64,
}
