//! Internal diagnostics through `tracing`
//!
//! Channels report opens, flushes and failures as tracing events. Embedding applications
//! usually install their own subscriber; [`init_tracing`] is a stderr fallback.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "chanlog=warn";

/// Install a stderr fmt subscriber filtered by `RUST_LOG` (default [`DEFAULT_FILTER`])
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
