//! Structured logging configuration.
//!
//! Plain-text or JSON output through `tracing-subscriber`; `RUST_LOG`
//! overrides the configured level.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);
        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);
        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to install tracing subscriber: {e}")))?;

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // Whichever call installs first wins; the other must not panic.
        let first = init_tracing("debug", false);
        let second = init_tracing("debug", true);
        assert!(first.is_ok() || second.is_err());
        assert!(second.is_err());
    }
}
