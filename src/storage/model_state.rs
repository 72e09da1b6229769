//! Model records keyed by (library id, relative path).
//!
//! These are the only writes the scanner performs. Each call is atomic on
//! its own; the orchestrator groups a whole scan into one transaction.

use rusqlite::{Connection, OptionalExtension, Row};

use super::models::{now_unix, ModelRecord, NewModel};
use crate::error::StorageError;
use crate::Result;

const MODEL_COLUMNS: &str =
    "id, library_id, path, fingerprint, file_count, created_at, updated_at";

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<ModelRecord> {
    Ok(ModelRecord {
        id: row.get(0)?,
        library_id: row.get(1)?,
        path: row.get(2)?,
        fingerprint: row.get(3)?,
        file_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// List every model of a library, ordered by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_models(conn: &Connection, library_id: i64) -> Result<Vec<ModelRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE library_id = ? ORDER BY path"
        ))
        .map_err(StorageError::from)?;

    let models = stmt
        .query_map([library_id], model_from_row)
        .map_err(StorageError::from)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StorageError::from)?;

    Ok(models)
}

/// Get one model by library and relative path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_model(conn: &Connection, library_id: i64, path: &str) -> Result<Option<ModelRecord>> {
    conn.query_row(
        &format!("SELECT {MODEL_COLUMNS} FROM models WHERE library_id = ? AND path = ?"),
        rusqlite::params![library_id, path],
        model_from_row,
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Insert a model row.
///
/// # Errors
///
/// Returns an error if the row already exists or the insert fails.
pub fn create_model(conn: &Connection, model: &NewModel<'_>) -> Result<ModelRecord> {
    let now = now_unix();
    conn.execute(
        "INSERT INTO models (library_id, path, fingerprint, file_count, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            model.library_id,
            model.path,
            model.fingerprint,
            model.file_count,
            now,
            now
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to create model '{}': {e}", model.path)))?;

    Ok(ModelRecord {
        id: conn.last_insert_rowid(),
        library_id: model.library_id,
        path: model.path.to_string(),
        fingerprint: model.fingerprint.map(String::from),
        file_count: model.file_count,
        created_at: now,
        updated_at: now,
    })
}

/// Replace the stored fingerprint of a model.
///
/// # Errors
///
/// Returns `NotFound` if the model does not exist.
pub fn update_model_fingerprint(
    conn: &Connection,
    id: i64,
    fingerprint: &str,
    file_count: i64,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE models SET fingerprint = ?, file_count = ?, updated_at = ? WHERE id = ?",
            rusqlite::params![fingerprint, file_count, now_unix(), id],
        )
        .map_err(StorageError::from)?;

    if updated == 0 {
        return Err(StorageError::not_found("model", id.to_string()).into());
    }
    Ok(())
}

/// Move a model to a new relative path, keeping its id.
///
/// # Errors
///
/// Returns `NotFound` if the model does not exist.
pub fn rename_model(conn: &Connection, id: i64, path: &str) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE models SET path = ?, updated_at = ? WHERE id = ?",
            rusqlite::params![path, now_unix(), id],
        )
        .map_err(StorageError::from)?;

    if updated == 0 {
        return Err(StorageError::not_found("model", id.to_string()).into());
    }
    Ok(())
}

/// Forget the fingerprint of a model so the next scan treats it as changed.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn clear_model_fingerprint(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE models SET fingerprint = NULL, updated_at = ? WHERE id = ?",
        rusqlite::params![now_unix(), id],
    )
    .map_err(StorageError::from)?;
    Ok(())
}

/// Delete a model row.
///
/// # Errors
///
/// Returns `NotFound` if the model does not exist.
pub fn delete_model(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM models WHERE id = ?", [id])
        .map_err(StorageError::from)?;

    if deleted == 0 {
        return Err(StorageError::not_found("model", id.to_string()).into());
    }
    Ok(())
}

/// Count models in a library.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_models(conn: &Connection, library_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM models WHERE library_id = ?",
        [library_id],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Database(e.to_string()).into())
}
