use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::Duration;

/// Connection and polling configuration for the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_secs: Option<u64>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
    #[serde(deserialize_with = "deserialize_optional_duration")]
    pub max_poll_duration: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout_secs: Some(30),
            poll_interval: Duration::from_millis(1000),
            max_poll_failures: 3,
            max_poll_duration: None,
        }
    }
}

impl ClientSettings {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";

    const BASE_URL_ENV: &'static str = "SENTINEL_BASE_URL";
    const TIMEOUT_ENV: &'static str = "SENTINEL_TIMEOUT_SECS";
    const POLL_INTERVAL_ENV: &'static str = "SENTINEL_POLL_INTERVAL";
    const MAX_FAILURES_ENV: &'static str = "SENTINEL_MAX_POLL_FAILURES";
    const MAX_DURATION_ENV: &'static str = "SENTINEL_MAX_POLL_DURATION";

    /// Load settings from environment variables.
    ///
    /// * `SENTINEL_BASE_URL`: Backend base URL (default: `http://localhost:8000`).
    /// * `SENTINEL_TIMEOUT_SECS`: Per-request timeout in seconds (default: 30).
    /// * `SENTINEL_POLL_INTERVAL`: Status poll interval, e.g. `1s` or `250ms`.
    /// * `SENTINEL_MAX_POLL_FAILURES`: Consecutive failed polls before giving up (default: 3).
    /// * `SENTINEL_MAX_POLL_DURATION`: Optional overall polling limit, e.g. `10m`.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get(Self::BASE_URL_ENV).unwrap_or(defaults.base_url);
        let timeout_secs = match get(Self::TIMEOUT_ENV) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .with_context(|| format!("invalid {} value `{raw}`", Self::TIMEOUT_ENV))?,
            ),
            None => defaults.timeout_secs,
        };
        let poll_interval = match get(Self::POLL_INTERVAL_ENV) {
            Some(raw) => humantime::parse_duration(&raw)
                .with_context(|| format!("invalid {} value `{raw}`", Self::POLL_INTERVAL_ENV))?,
            None => defaults.poll_interval,
        };
        let max_poll_failures = get(Self::MAX_FAILURES_ENV)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.max_poll_failures);
        let max_poll_duration = get(Self::MAX_DURATION_ENV)
            .map(|raw| {
                humantime::parse_duration(&raw)
                    .with_context(|| format!("invalid {} value `{raw}`", Self::MAX_DURATION_ENV))
            })
            .transpose()?;

        Ok(Self {
            base_url,
            timeout_secs,
            poll_interval,
            max_poll_failures,
            max_poll_duration,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
