//! Tracing setup shared by the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// JSON logs filtered by `RUST_LOG`, or `fallback_level` when it is unset.
pub fn init_tracing(fallback_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback_level.into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
