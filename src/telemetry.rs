//! Tracing subscriber setup for binaries and tests.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: env-filtered fmt output plus span traces
/// for error reports.
///
/// Filter directives come from `RUST_LOG` (after loading `.env` via
/// dotenvy), defaulting to `info`. Safe to call repeatedly; only the first
/// call installs.
pub fn init() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}
