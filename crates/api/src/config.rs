//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use saga::RetryPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` PostgreSQL connection string; in-memory stores when unset
/// - `SEED_PATH` JSON file with routes, bookings, drivers and vehicles to load at startup
/// - `IO_TIMEOUT_MS` deadline per store or directory call (default: `5000`)
/// - `IO_MAX_ATTEMPTS` attempts per call, including the first (default: `3`)
/// - `IO_INITIAL_BACKOFF_MS` first retry delay (default: `50`)
/// - `IO_MAX_BACKOFF_MS` retry delay cap (default: `2000`)
/// - `RECONCILE_INTERVAL_SECS` period of the background sweep; disabled when unset or `0`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub seed_path: Option<PathBuf>,
    pub io_timeout: Duration,
    pub io_max_attempts: u32,
    pub io_initial_backoff: Duration,
    pub io_max_backoff: Duration,
    pub reconcile_interval: Option<Duration>,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: env_non_empty("DATABASE_URL"),
            seed_path: env_non_empty("SEED_PATH").map(PathBuf::from),
            io_timeout: env_parse("IO_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.io_timeout),
            io_max_attempts: env_parse("IO_MAX_ATTEMPTS").unwrap_or(defaults.io_max_attempts),
            io_initial_backoff: env_parse("IO_INITIAL_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.io_initial_backoff),
            io_max_backoff: env_parse("IO_MAX_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.io_max_backoff),
            reconcile_interval: env_parse::<u64>("RECONCILE_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout and backoff settings for the orchestrator's I/O calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.io_max_attempts.max(1))
            .with_backoff(self.io_initial_backoff, self.io_max_backoff)
            .with_timeout(self.io_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            seed_path: None,
            io_timeout: retry.timeout,
            io_max_attempts: retry.max_attempts,
            io_initial_backoff: retry.initial_backoff,
            io_max_backoff: retry.max_backoff,
            reconcile_interval: None,
        }
    }
}
