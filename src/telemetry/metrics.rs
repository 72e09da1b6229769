//! Prometheus metrics definitions.
//!
//! Registered in the default registry; exposition is left to the embedder.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Library scans by outcome (`ok`, `unavailable`, `error`).
pub static SCANS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "modelshelf_scans_total",
        "Library scans by outcome",
        &["outcome"]
    )
    .expect("scans_total registers once")
});

/// Model changes applied to the store by kind (`added`, `changed`, `removed`).
pub static MODEL_CHANGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "modelshelf_model_changes_total",
        "Model records written by scans",
        &["kind"]
    )
    .expect("model_changes_total registers once")
});

/// Rescan tasks handed to the queue.
pub static RESCANS_ENQUEUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "modelshelf_rescans_enqueued_total",
        "Rescan tasks submitted"
    )
    .expect("rescans_enqueued_total registers once")
});

/// Wall time of a library scan.
pub static SCAN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "modelshelf_scan_duration_seconds",
        "Library scan duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
    )
    .expect("scan_duration registers once")
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    Lazy::force(&SCANS_TOTAL);
    Lazy::force(&MODEL_CHANGES_TOTAL);
    Lazy::force(&RESCANS_ENQUEUED_TOTAL);
    Lazy::force(&SCAN_DURATION);

    tracing::debug!("Prometheus metrics initialized");
}
