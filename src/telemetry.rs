//! Tracing subscriber setup for hosts that embed the engine.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Install a compact fmt subscriber filtered at `info` (or `debug`).
///
/// `RUST_LOG` takes precedence when set. Returns an error rather than
/// panicking if a global subscriber is already installed.
pub fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = build_env_filter(debug);
    let fmt_layer = tracing_subscriber::fmt::layer().compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install tracing subscriber: {error}"))
}

fn build_env_filter(debug: bool) -> tracing_subscriber::EnvFilter {
    let default_directive = if debug { "debug" } else { "info" };
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive))
}
