//! Configuration management for Modelshelf.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{
    Config, DEFAULT_BUNDLE_MARKERS, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_MODEL_EXTENSIONS,
};
