#![forbid(unsafe_code)]

//! Log output for hosts that do not install their own subscriber.
//!
//! The bodesk crates only emit `tracing` events. Hosts with a subscriber
//! already in place need nothing from this module.
//!
//! ## Environment Variables
//!
//! 1. **`BODESK_LOG`** (highest priority): a level (`debug`) or a full filter
//!    directive (`bodesk_url=trace,info`).
//! 2. **`RUST_LOG`**: standard tracing filter.
//! 3. **Default**: `info`.

use std::env;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BODESK_LOG";

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Install a fmt subscriber on stderr.
///
/// Fails if a global subscriber is already set or the filter is invalid.
pub fn init() -> Result<(), InitError> {
    tracing_subscriber::fmt()
        .with_env_filter(create_filter()?)
        .with_writer(std::io::stderr)
        .try_init()
}

/// Install a test-writer subscriber, ignoring "already installed".
pub fn test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(create_filter().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

fn create_filter() -> Result<EnvFilter, InitError> {
    if let Ok(directives) = env::var(LOG_ENV) {
        return Ok(EnvFilter::try_new(directives)?);
    }
    if env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::try_from_default_env()?);
    }
    Ok(EnvFilter::new("info"))
}
