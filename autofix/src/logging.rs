//! Diagnostic tracing for the workflow.
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG`. They are separate
//! from the per-phase executor logs under `.autofix/logs/`, which are always
//! written.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Compact format on stderr. Fails if a
/// global subscriber is already installed.
///
/// ```bash
/// RUST_LOG=autofix=debug my-host-binary
/// ```
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}
