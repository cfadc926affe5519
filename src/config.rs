//! Runtime configuration
//!
//! This module provides the configuration that decides which numeric backend
//! layers are built against, and how verbosely the library logs.

use std::fs;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::backend::{select_backend, BackendKind, TensorAlgebra};
use crate::error::Result;
use crate::utils::logging::parse_filter;

/// Runtime configuration
///
/// This structure is used to parse runtime configuration from JSON files.
///
/// - **backend**: `"graph"` (alias `"tensorflow"`) or `"symbolic"` (alias `"theano"`)
/// - **log_filter**: optional `tracing` filter directives, e.g. `"masked_layers=debug"`
///
/// # Example
///
/// ```json
/// {
///   "backend": "graph",
///   "log_filter": "masked_layers=debug"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Backend name
    pub backend: String,

    /// Log filter directives
    pub log_filter: Option<String>,
}

impl RuntimeConfig {
    /// Resolved backend kind.
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.backend.parse()
    }

    /// Tensor-algebra provider for the configured backend.
    pub fn algebra(&self) -> Result<Arc<dyn TensorAlgebra>> {
        Ok(select_backend(self.backend_kind()?))
    }
}

/// Loads a runtime configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into a `RuntimeConfig`.
///
/// # Returns
///
/// `Ok(RuntimeConfig)` on success, or an error if the file cannot be read, the JSON is
/// invalid, or the backend is not supported.
///
/// # Examples
///
/// ```no_run
/// use masked_layers::config::load_config;
///
/// let cfg = load_config("config/runtime.json").unwrap();
/// let algebra = cfg.algebra().unwrap();
/// ```
pub fn load_config(path: &str) -> Result<RuntimeConfig> {
    let contents = fs::read_to_string(path)?;
    let config: RuntimeConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    debug!(path, backend = %config.backend, "loaded runtime config");
    Ok(config)
}

fn validate_config(config: &RuntimeConfig) -> Result<()> {
    config.backend_kind()?;

    if let Some(filter) = &config.log_filter {
        parse_filter(filter)?;
    }

    Ok(())
}
