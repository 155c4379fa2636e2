//! Configuration Module
//!
//! Handles loading the demo server's configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Latency of the time resource in milliseconds
    pub time_delay_ms: u64,
    /// Latency of the user resource in milliseconds
    pub user_delay_ms: u64,
    /// Latency of the posts resource in milliseconds
    pub posts_delay_ms: u64,
    /// Latency of the stats resource in milliseconds
    pub stats_delay_ms: u64,
    /// Latency of each resource in the simultaneous section
    pub simultaneous_delay_ms: u64,
    /// Seconds between background revalidations of the time key, 0 disables
    pub revalidate_interval: u64,
    /// Milliseconds after a fetch during which a new binding reuses the
    /// cached value instead of revalidating
    pub dedupe_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `TIME_DELAY_MS` - Time resource latency (default: 3000)
    /// - `USER_DELAY_MS` - User resource latency (default: 1000)
    /// - `POSTS_DELAY_MS` - Posts resource latency (default: 2000)
    /// - `STATS_DELAY_MS` - Stats resource latency (default: 3000)
    /// - `SIMULTANEOUS_DELAY_MS` - Latency of each simultaneous resource (default: 1500)
    /// - `REVALIDATE_INTERVAL` - Background revalidation period in seconds (default: 0, off)
    /// - `DEDUPE_INTERVAL_MS` - Revalidate-on-mount window (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: var_or("SERVER_PORT", defaults.server_port),
            time_delay_ms: var_or("TIME_DELAY_MS", defaults.time_delay_ms),
            user_delay_ms: var_or("USER_DELAY_MS", defaults.user_delay_ms),
            posts_delay_ms: var_or("POSTS_DELAY_MS", defaults.posts_delay_ms),
            stats_delay_ms: var_or("STATS_DELAY_MS", defaults.stats_delay_ms),
            simultaneous_delay_ms: var_or("SIMULTANEOUS_DELAY_MS", defaults.simultaneous_delay_ms),
            revalidate_interval: var_or("REVALIDATE_INTERVAL", defaults.revalidate_interval),
            dedupe_interval_ms: var_or("DEDUPE_INTERVAL_MS", defaults.dedupe_interval_ms),
        }
    }

    /// Same delay for every resource; handy for tests.
    pub fn with_uniform_delay(delay_ms: u64) -> Self {
        Self {
            time_delay_ms: delay_ms,
            user_delay_ms: delay_ms,
            posts_delay_ms: delay_ms,
            stats_delay_ms: delay_ms,
            simultaneous_delay_ms: delay_ms,
            ..Self::default()
        }
    }

    pub fn time_delay(&self) -> Duration {
        Duration::from_millis(self.time_delay_ms)
    }

    pub fn user_delay(&self) -> Duration {
        Duration::from_millis(self.user_delay_ms)
    }

    pub fn posts_delay(&self) -> Duration {
        Duration::from_millis(self.posts_delay_ms)
    }

    pub fn stats_delay(&self) -> Duration {
        Duration::from_millis(self.stats_delay_ms)
    }

    pub fn simultaneous_delay(&self) -> Duration {
        Duration::from_millis(self.simultaneous_delay_ms)
    }

    pub fn dedupe_interval(&self) -> Duration {
        Duration::from_millis(self.dedupe_interval_ms)
    }

    /// Background revalidation period, `None` when disabled.
    pub fn revalidate_every(&self) -> Option<Duration> {
        (self.revalidate_interval > 0).then(|| Duration::from_secs(self.revalidate_interval))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            time_delay_ms: 3000,
            user_delay_ms: 1000,
            posts_delay_ms: 2000,
            stats_delay_ms: 3000,
            simultaneous_delay_ms: 1500,
            revalidate_interval: 0,
            dedupe_interval_ms: 2000,
        }
    }
}

/// Parses `name` from the environment, falling back to `default` when unset or invalid.
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
