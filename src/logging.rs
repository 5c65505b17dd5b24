//! Logging Initialization
//!
//! Builds the global `tracing` subscriber from [`LoggingConfig`]. The
//! `RUST_LOG` environment variable, when set, takes precedence over the
//! configured level.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// # Arguments
///
/// * `config` - Logging level and format (`json`, `pretty`, or `compact`)
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the
/// level/format is invalid.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => anyhow::bail!("Invalid log format: {}", other),
    }
    .map_err(|err| anyhow::anyhow!("Failed to install tracing subscriber: {}", err))?;

    Ok(())
}
