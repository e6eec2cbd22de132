//! Configuration Module
//!
//! Handles loading and managing engine and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Upper bound in seconds on a single producer call in `fetch_with_cache`
    pub fetch_timeout: u64,
    /// TTL in seconds applied to cached pages
    pub page_ttl: u64,
    /// Collapse concurrent misses for the same resource into one producer call
    pub single_flight: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `FETCH_TIMEOUT` - Producer timeout in seconds (default: 10)
    /// - `PAGE_TTL` - Cached page lifetime in seconds (default: 10)
    /// - `SINGLE_FLIGHT` - `true`/`false` (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            fetch_timeout: env_or("FETCH_TIMEOUT", defaults.fetch_timeout),
            page_ttl: env_or("PAGE_TTL", defaults.page_ttl),
            single_flight: env_or("SINGLE_FLIGHT", defaults.single_flight),
        }
    }

    /// Producer timeout as a Duration.
    pub fn fetch_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    /// Page TTL as a Duration.
    pub fn page_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.page_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            fetch_timeout: 10,
            page_ttl: 10,
            single_flight: false,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
