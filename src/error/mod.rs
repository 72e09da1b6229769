//! Error types and Result aliases for Modelshelf.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using Modelshelf's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Modelshelf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The library root is missing or unreadable. Fatal to one scan.
    #[error("library unavailable at '{}': {reason}", path.display())]
    LibraryUnavailable { path: PathBuf, reason: String },

    /// A single file or directory could not be read.
    ///
    /// Recovered during walks; only surfaced directly by helpers that
    /// inspect one entry.
    #[error("unreadable entry '{}': {reason}", path.display())]
    EntryUnreadable { path: PathBuf, reason: String },

    /// A path outside the library root reached the normalizer.
    #[error("path '{}' is not inside library root '{}'", path.display(), root.display())]
    InvalidPathKind { path: PathBuf, root: PathBuf },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rescan task could not be submitted.
    #[error("task queue error: {0}")]
    Queue(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a queue error.
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a library-unavailable error.
    pub fn library_unavailable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::LibraryUnavailable {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create an entry-unreadable error.
    pub fn entry_unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::EntryUnreadable {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a library scan.
    ///
    /// Everything except `EntryUnreadable` is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::EntryUnreadable { .. })
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
