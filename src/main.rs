//! Modelshelf - 3D model library scanner
//!
//! Entry point for the `modelshelf` command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use modelshelf::config::{
    DEFAULT_BUNDLE_MARKERS, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_MODEL_EXTENSIONS,
};
use modelshelf::scanner::{LibraryScanner, RescanRequest, ScanSettings};
use modelshelf::storage::{
    count_models, create_library, get_library, get_library_by_path, init_storage,
    list_libraries, Database, Library,
};
use modelshelf::telemetry::{init_metrics, init_tracing};
use modelshelf::{Config, Error, Result};
use serde::Serialize;
use tokio::sync::mpsc;

/// Modelshelf - keeps a 3D model library in sync with disk
#[derive(Parser, Debug)]
#[command(name = "modelshelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Data directory for `SQLite` database
    #[arg(short, long, global = true, env = "MODELSHELF_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MODELSHELF_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, global = true, env = "MODELSHELF_LOG_JSON")]
    log_json: bool,

    /// Treat library paths as case sensitive (probed when omitted)
    #[arg(long, global = true, env = "MODELSHELF_CASE_SENSITIVE")]
    case_sensitive: Option<bool>,

    /// Model file extensions, without dots
    #[arg(long, global = true, env = "MODELSHELF_EXTENSIONS", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Folder names that mark a single-model bundle
    #[arg(long, global = true, env = "MODELSHELF_BUNDLE_MARKERS", value_delimiter = ',')]
    markers: Vec<String>,

    /// Gitignore-style patterns to skip
    #[arg(long, global = true, env = "MODELSHELF_EXCLUDE", value_delimiter = ',')]
    exclude: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a library root
    Add {
        /// Library root directory
        path: PathBuf,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// List registered libraries
    List,
    /// Scan one library, or all of them
    Scan {
        /// Library id to scan
        #[arg(short, long)]
        library: Option<i64>,
    },
}

#[derive(Serialize)]
struct LibraryListing {
    #[serde(flatten)]
    library: Library,
    models: i64,
}

fn or_defaults(values: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|s| (*s).to_string()).collect()
    } else {
        values
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal(format!("failed to encode output: {e}")))?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    tracing::info!("Modelshelf v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        data_dir: cli.data_dir,
        log_level: cli.log_level,
        log_json: cli.log_json,
        model_extensions: or_defaults(cli.extensions, DEFAULT_MODEL_EXTENSIONS),
        bundle_markers: or_defaults(cli.markers, DEFAULT_BUNDLE_MARKERS),
        exclude_patterns: or_defaults(cli.exclude, DEFAULT_EXCLUDE_PATTERNS),
        case_sensitive: cli.case_sensitive,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db = Database::open(config.database_path())?;
    init_storage(&db)?;

    init_metrics();

    match cli.command {
        Command::Add { path, name } => add_library(&db, &path, name.as_deref()),
        Command::List => list(&db),
        Command::Scan { library } => scan(&config, db, library).await,
    }
}

fn add_library(db: &Database, path: &std::path::Path, name: Option<&str>) -> Result<()> {
    let root = std::fs::canonicalize(path)
        .map_err(|e| Error::library_unavailable(path, e.to_string()))?;

    let library = db.with_conn(|conn| match get_library_by_path(conn, &root)? {
        Some(existing) => {
            tracing::info!(library_id = existing.id, "Library already registered");
            Ok(existing)
        }
        None => create_library(conn, &root, name),
    })?;

    print_json(&library)
}

fn list(db: &Database) -> Result<()> {
    let listings = db.with_conn(|conn| {
        list_libraries(conn)?
            .into_iter()
            .map(|library| {
                let models = count_models(conn, library.id)?;
                Ok(LibraryListing { library, models })
            })
            .collect::<Result<Vec<_>>>()
    })?;

    print_json(&listings)
}

async fn scan(config: &Config, db: Database, library_id: Option<i64>) -> Result<()> {
    let libraries = match library_id {
        Some(id) => vec![db
            .with_conn(|conn| get_library(conn, id))?
            .ok_or_else(|| modelshelf::StorageError::not_found("library", id.to_string()))?],
        None => db.with_conn(list_libraries)?,
    };

    if libraries.is_empty() {
        tracing::warn!("No libraries registered; use `modelshelf add <path>` first");
        return Ok(());
    }

    let settings = ScanSettings::resolve(config)?;
    tracing::info!(case = ?settings.case, libraries = libraries.len(), "Scanning libraries");

    let (tx, mut rx) = mpsc::unbounded_channel::<RescanRequest>();
    let drain = tokio::spawn(async move {
        let mut drained = 0_usize;
        while let Some(request) = rx.recv().await {
            tracing::info!(
                task_id = %request.task_id,
                library_id = request.library_id,
                model_id = request.model_id,
                model = %request.model_path,
                reason = ?request.reason,
                "Rescan task queued"
            );
            drained += 1;
        }
        drained
    });

    let scanner = LibraryScanner::new(db, Arc::new(tx), settings);
    let results = scanner.scan_all(&libraries).await;
    drop(scanner);

    let drained = drain
        .await
        .map_err(|e| Error::internal(format!("rescan drain task failed: {e}")))?;
    tracing::debug!(drained, "Rescan channel closed");

    let mut summaries = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (library, result) in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                failed += 1;
                tracing::error!(library = %library.label(), error = %e, "Scan failed");
            }
        }
    }

    print_json(&summaries)?;

    if failed > 0 {
        return Err(Error::internal(format!("{failed} library scan(s) failed")));
    }
    Ok(())
}
