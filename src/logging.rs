//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber writing to stderr so that command
//! output on stdout stays machine-readable. The level comes from
//! `[logging].level` and can be overridden with `RUST_LOG`.

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global subscriber. Call once, at process start.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level: LevelFilter = config
        .level
        .parse()
        .map_err(|_| anyhow!("Invalid logging.level: '{}'", config.level))?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format.as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
