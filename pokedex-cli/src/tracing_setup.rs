//! Tracing setup for the pokedex CLI
//!
//! Usage:
//!   pokedex --debug ...               # Debug logging
//!   RUST_LOG=pokedex_core=debug ...   # Fine-grained log control
//!
//! The filter is chosen in this order: `RUST_LOG`, then `--debug`, then
//! `[log] level` from the config file, then `info`. Logs go to stderr so
//! command output on stdout stays clean.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging unless RUST_LOG is set
    pub debug: bool,
    /// Level from the config file
    pub level: Option<String>,
}

impl TracingConfig {
    fn fallback_directive(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            self.level.as_deref().unwrap_or("info")
        }
    }
}

pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let directive = config.fallback_directive();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive)
            .map_err(|err| anyhow!("invalid log level '{}': {}", directive, err))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
