//! Logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_logging`] is a convenience for binaries and tests.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Default filter used when none is configured.
pub const DEFAULT_FILTER: &str = "masked_layers=info";

/// Parses `RUST_LOG`-style directives, e.g. `"masked_layers=debug"`.
pub fn parse_filter(filter: &str) -> Result<EnvFilter> {
    if filter.trim().is_empty() {
        return Err(Error::config("log_filter must not be empty"));
    }
    EnvFilter::try_new(filter)
        .map_err(|err| Error::config(format!("Invalid log_filter '{}': {}", filter, err)))
}

/// Installs a formatted stderr subscriber filtered by `filter`, or by
/// [`DEFAULT_FILTER`] when `None`.
///
/// Returns `Ok(false)` if a global subscriber was already installed; calling
/// this more than once is harmless.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `filter` cannot be parsed.
pub fn init_logging(filter: Option<&str>) -> Result<bool> {
    let filter = parse_filter(filter.unwrap_or(DEFAULT_FILTER))?;

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}
