//! `SQLite` record store.
//!
//! This module provides persistent storage for:
//! - Libraries (tracked root directories)
//! - Models and the fingerprint of their last scan

mod connection;
mod libraries;
mod model_state;
mod models;
mod schema;

pub use connection::Database;
pub use libraries::{
    create_library, delete_library, get_library, get_library_by_path, list_libraries,
};
pub use model_state::{
    clear_model_fingerprint, count_models, create_model, delete_model, get_model, list_models,
    rename_model, update_model_fingerprint,
};
pub use models::{Library, ModelRecord, NewModel};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
