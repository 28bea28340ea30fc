//! Development-time tracing for debugging the launcher.
//!
//! Tracing is dev diagnostics via `RUST_LOG`, output to stderr. The run's
//! streamed output goes to the caller's
//! [`OutputSink`](crate::supervisor::OutputSink) and is never routed
//! through the subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=launcher=debug cargo run -- run wait_script.py
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
