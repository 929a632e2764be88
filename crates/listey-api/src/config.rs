use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Upper bound on one reconciliation, including waiting for the root lock
    pub sync_timeout: Duration,
    pub rate_limit_window: Duration,
    pub sync_rate_limit_per_window: u32,
    pub fetch_rate_limit_per_window: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "LISTEY_API_BIND_ADDR", "127.0.0.1:8080");

        let sync_timeout_ms =
            ranged_u64(&lookup, "LISTEY_SYNC_TIMEOUT_MS", 5_000, 100..=60_000)?;
        let rate_limit_window_secs =
            ranged_u64(&lookup, "RATE_LIMIT_WINDOW_SECS", 60, 10..=3_600)?;
        let sync_rate_limit_per_window =
            ranged_u32(&lookup, "SYNC_RATE_LIMIT_PER_WINDOW", 60, 1..=1_000)?;
        let fetch_rate_limit_per_window =
            ranged_u32(&lookup, "FETCH_RATE_LIMIT_PER_WINDOW", 240, 1..=5_000)?;

        Ok(Self {
            bind_addr,
            sync_timeout: Duration::from_millis(sync_timeout_ms),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_rate_limit_per_window,
            fetch_rate_limit_per_window,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            sync_timeout: Duration::from_secs(5),
            rate_limit_window: Duration::from_secs(60),
            sync_rate_limit_per_window: 60,
            fetch_rate_limit_per_window: 240,
        }
    }
}

fn ranged_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = match optional_trimmed(lookup, name) {
        Some(raw) => raw.parse::<u64>().map_err(|_| invalid())?,
        None => default,
    };
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn ranged_u32(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
    range: RangeInclusive<u32>,
) -> Result<u32, ConfigError> {
    let value = ranged_u64(
        lookup,
        name,
        u64::from(default),
        u64::from(*range.start())..=u64::from(*range.end()),
    )?;
    u32::try_from(value).map_err(|_| ConfigError::Invalid(format!("{name} is out of range")))
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
