//! Logging setup
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`init_tracing`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,issuance=debug";

/// Output format of the fmt subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Compact => registry.with(fmt::layer().compact().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
    };
    result.is_ok()
}
