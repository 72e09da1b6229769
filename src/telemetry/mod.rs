//! Logging and metrics setup.

mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::init_metrics;
