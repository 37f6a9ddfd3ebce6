//! Log output for the CLI.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install a stderr fmt subscriber filtered by `log_level`.
///
/// `log_level` is a level name or any `EnvFilter` directive string; an
/// unparseable value falls back to `info`.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))
}
