//! Library records.

use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::models::{now_unix, Library};
use crate::error::StorageError;
use crate::Result;

fn library_from_row(row: &Row<'_>) -> rusqlite::Result<Library> {
    let path: String = row.get(1)?;
    Ok(Library {
        id: row.get(0)?,
        path: PathBuf::from(path),
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Register a library root.
///
/// # Errors
///
/// Returns an error if the path is already registered or the insert fails.
pub fn create_library(conn: &Connection, path: &Path, name: Option<&str>) -> Result<Library> {
    let created_at = now_unix();
    let path_str = path.to_string_lossy().to_string();

    conn.execute(
        "INSERT INTO libraries (path, name, created_at) VALUES (?, ?, ?)",
        rusqlite::params![path_str, name, created_at],
    )
    .map_err(|e| StorageError::Database(format!("failed to create library: {e}")))?;

    Ok(Library {
        id: conn.last_insert_rowid(),
        path: path.to_path_buf(),
        name: name.map(String::from),
        created_at,
    })
}

/// Get a library by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_library(conn: &Connection, id: i64) -> Result<Option<Library>> {
    conn.query_row(
        "SELECT id, path, name, created_at FROM libraries WHERE id = ?",
        [id],
        library_from_row,
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Get a library by its root path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_library_by_path(conn: &Connection, path: &Path) -> Result<Option<Library>> {
    conn.query_row(
        "SELECT id, path, name, created_at FROM libraries WHERE path = ?",
        [path.to_string_lossy()],
        library_from_row,
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// List all libraries ordered by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_libraries(conn: &Connection) -> Result<Vec<Library>> {
    let mut stmt = conn
        .prepare("SELECT id, path, name, created_at FROM libraries ORDER BY id")
        .map_err(StorageError::from)?;

    let libraries = stmt
        .query_map([], library_from_row)
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StorageError::from)?;

    Ok(libraries)
}

/// Delete a library and, by cascade, all of its models.
///
/// # Errors
///
/// Returns `NotFound` if no such library exists.
pub fn delete_library(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM libraries WHERE id = ?", [id])
        .map_err(StorageError::from)?;

    if deleted == 0 {
        return Err(StorageError::not_found("library", id.to_string()).into());
    }
    Ok(())
}
