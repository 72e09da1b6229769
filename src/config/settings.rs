//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// File extensions recognized as printable model assets.
pub const DEFAULT_MODEL_EXTENSIONS: &[&str] = &[
    "stl", "obj", "3mf", "ply", "gltf", "glb", "fbx", "dae", "3ds", "amf", "off", "step", "stp",
    "iges", "igs", "blend", "scad", "f3d", "lys", "lyt", "ctb", "chitubox", "gcode",
];

/// Subfolder names that mark a folder as a single-model bundle
/// (Thingiverse-style `files/` + `images/` archives).
pub const DEFAULT_BUNDLE_MARKERS: &[&str] = &["files", "images"];

/// Gitignore-style patterns excluded from every scan.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    ".*",
    "__MACOSX/",
    "Thumbs.db",
    "desktop.ini",
];

/// Main configuration for Modelshelf.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` database.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Extensions (without dot) that count as model files.
    pub model_extensions: Vec<String>,

    /// Subfolder names that turn their parent into one bundled model.
    pub bundle_markers: Vec<String>,

    /// Gitignore-style patterns for files that never reach the grouper.
    pub exclude_patterns: Vec<String>,

    /// Case sensitivity of library paths. `None` probes the filesystem
    /// holding `data_dir` at startup.
    pub case_sensitive: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            log_json: false,
            model_extensions: to_owned_list(DEFAULT_MODEL_EXTENSIONS),
            bundle_markers: to_owned_list(DEFAULT_BUNDLE_MARKERS),
            exclude_patterns: to_owned_list(DEFAULT_EXCLUDE_PATTERNS),
            case_sensitive: None,
        }
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Config {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.model_extensions.is_empty() {
            return Err(Error::config("model_extensions cannot be empty"));
        }

        for ext in &self.model_extensions {
            if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
                return Err(Error::config(format!(
                    "invalid model extension '{ext}', expected a bare extension like 'stl'"
                )));
            }
        }

        for marker in &self.bundle_markers {
            if marker.is_empty() || marker.contains(['/', '\\']) {
                return Err(Error::config(format!(
                    "invalid bundle marker '{marker}', expected a single folder name"
                )));
            }
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("modelshelf.db")
    }
}
