//! Structured logging initialization via `tracing`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Initialize a plain fmt subscriber.
///
/// Respects the `RUST_LOG` environment variable for filtering and falls back
/// to `info`. Safe to call more than once (later calls are no-ops), so test
/// harnesses can call it freely; the daemon configures logging through
/// `prism_node::init_logging` instead.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
