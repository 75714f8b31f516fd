//! Server configuration: CLI flags, defaults, and eager validation.

use clap::Parser;
use kvforge_core::{Error, Result, SyncMode};
use std::path::PathBuf;
use std::str::FromStr;

/// Every tunable this server exposes, parsed from process arguments with
/// `clap`'s derive API, the same way this project's storage layer exposes
/// a config struct with field-level overrides.
///
/// # Example
///
/// ```
/// use kvforge_server::config::ServerConfig;
///
/// let config = ServerConfig {
///     host: "127.0.0.1".into(),
///     port: 6677,
///     capacity: 10_000,
///     aof_path: "appendonly.aof".into(),
///     sync_mode: "normal".into(),
///     poll_timeout_ms: 1000,
///     log_level: "info".into(),
/// };
/// assert!(config.sync_mode().is_ok());
/// ```
#[derive(Debug, Clone, Parser)]
#[command(name = "kvforge-server", about = "In-memory key-value and sorted-set store")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 6677)]
    pub port: u16,

    /// Maximum number of value entries plus sorted-set entries held at once
    #[arg(long, default_value_t = 10_000)]
    pub capacity: usize,

    /// Path to the append-only log file
    #[arg(long, default_value = "appendonly.aof")]
    pub aof_path: PathBuf,

    /// Durability level for append-only log writes: none, normal, or full
    #[arg(long, default_value = "none")]
    pub sync_mode: String,

    /// How long the event loop waits for readiness before its periodic tick, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_timeout_ms: u64,

    /// Log verbosity passed through to env_logger (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// Validates field invariants not already enforced by `clap`'s parsing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `capacity` is zero or `sync_mode` does
    /// not name a known durability level.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".to_string()));
        }
        self.sync_mode()?;
        Ok(())
    }

    /// Parses the `--sync-mode` flag into a [`SyncMode`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is not one of `none`,
    /// `normal`, or `full`.
    pub fn sync_mode(&self) -> Result<SyncMode> {
        SyncMode::from_str(&self.sync_mode).map_err(Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            host: "0.0.0.0".into(),
            port: 6677,
            capacity: 1,
            aof_path: "appendonly.aof".into(),
            sync_mode: "none".into(),
            poll_timeout_ms: 1000,
            log_level: "info".into(),
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = base_config();
        config.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nonzero_capacity_is_accepted() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn unknown_sync_mode_is_rejected() {
        let mut config = base_config();
        config.sync_mode = "bogus".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sync_mode_resolves_to_full() {
        let mut config = base_config();
        config.sync_mode = "full".into();
        assert_eq!(config.sync_mode().unwrap(), SyncMode::Full);
    }
}
