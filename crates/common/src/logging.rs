//! Logging utilities for vip-manager components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the filter: RUST_LOG wins, otherwise the configured level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize tracing with human readable output.
///
/// Uses the RUST_LOG environment variable to control log levels and
/// falls back to `level` when it is unset.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(filter(level))
        .init();
}
