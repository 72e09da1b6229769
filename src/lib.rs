//! Modelshelf Library
//!
//! Scanning core of a 3D-model library manager: finds models on disk,
//! keeps their records in `SQLite` and submits rescan tasks for new or
//! changed models.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod scanner;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result, StorageError};
