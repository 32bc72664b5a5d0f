//! Channel configuration.
//!
//! Timing knobs are data, not code: deployments tune fetch budgets and
//! logging cadence per robot through TOML instead of recompiling. Every
//! field has a default, so an empty document is a valid configuration.

use crate::error::{AxonError, AxonResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one channel end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Budget for timed fetches, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Poll cadence of the lock-free wait loop, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Log every Nth missed deadline. Keeps sustained overload visible
    /// without flooding the log.
    #[serde(default = "default_miss_log_every")]
    pub miss_log_every: u64,
}

fn default_fetch_timeout_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_miss_log_every() -> u64 {
    50
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            miss_log_every: default_miss_log_every(),
        }
    }
}

impl ChannelConfig {
    /// Parse from a TOML document and validate.
    pub fn from_toml(contents: &str) -> AxonResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| AxonError::config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AxonResult<()> {
        if self.miss_log_every == 0 {
            return Err(AxonError::config("miss_log_every must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(AxonError::config("poll_interval_ms must be at least 1"));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
