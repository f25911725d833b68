//! Configuration management for the platform.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default view-count window, about twenty years.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7300;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Analytics service settings
    pub stats: StatsConfig,
    /// Store runtime settings
    pub store: StoreConfig,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name reported with every hit
    pub name: String,
    /// How long a caller waits for a command outcome, in milliseconds
    pub command_timeout_ms: u64,
    /// Log filter (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Analytics service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Base URL of the analytics service
    pub url: String,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// How far back view counts reach, in days
    pub lookback_days: i64,
}

/// Store runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Outcome actions buffered for waiting callers
    pub broadcast_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            app: AppConfig {
                name: env::var("APP_NAME").unwrap_or_else(|_| "convene-main".to_string()),
                command_timeout_ms: env::var("COMMAND_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            },
            stats: StatsConfig {
                url: env::var("STATS_SERVER_URL")
                    .unwrap_or_else(|_| "http://localhost:9090".to_string()),
                timeout_ms: env::var("STATS_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
                lookback_days: env::var("STATS_LOOKBACK_DAYS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_LOOKBACK_DAYS),
            },
            store: StoreConfig {
                broadcast_capacity: env::var("STORE_BROADCAST_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1024),
            },
        }
    }

    /// Command outcome timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.app.command_timeout_ms)
    }

    /// Analytics call timeout as a [`Duration`].
    #[must_use]
    pub const fn stats_timeout(&self) -> Duration {
        Duration::from_millis(self.stats.timeout_ms)
    }

    /// View-count window as a [`chrono::Duration`].
    ///
    /// Negative or unrepresentable day counts fall back to
    /// [`DEFAULT_LOOKBACK_DAYS`].
    #[must_use]
    pub fn stats_lookback(&self) -> chrono::Duration {
        let default = chrono::Duration::days(DEFAULT_LOOKBACK_DAYS);
        match chrono::Duration::try_days(self.stats.lookback_days) {
            Some(lookback) if lookback >= chrono::Duration::zero() => lookback,
            _ => {
                tracing::warn!(
                    lookback_days = self.stats.lookback_days,
                    "Lookback out of range, using the default"
                );
                default
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: "convene-main".to_string(),
                command_timeout_ms: 5000,
                log_level: "info".to_string(),
            },
            stats: StatsConfig {
                url: "http://localhost:9090".to_string(),
                timeout_ms: 2000,
                lookback_days: DEFAULT_LOOKBACK_DAYS,
            },
            store: StoreConfig {
                broadcast_capacity: 1024,
            },
        }
    }
}
