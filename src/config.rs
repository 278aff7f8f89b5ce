//! Configuration management for the monitoring poller

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Auto-refresh periods offered by the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshInterval {
    TenSeconds,
    #[default]
    ThirtySeconds,
    SixtySeconds,
}

impl RefreshInterval {
    pub const CHOICES: [RefreshInterval; 3] = [
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
        RefreshInterval::SixtySeconds,
    ];

    pub fn from_secs(secs: u64) -> Option<Self> {
        match secs {
            10 => Some(RefreshInterval::TenSeconds),
            30 => Some(RefreshInterval::ThirtySeconds),
            60 => Some(RefreshInterval::SixtySeconds),
            _ => None,
        }
    }

    pub fn as_secs(&self) -> u64 {
        match self {
            RefreshInterval::TenSeconds => 10,
            RefreshInterval::ThirtySeconds => 30,
            RefreshInterval::SixtySeconds => 60,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshInterval::SixtySeconds => write!(f, "1min"),
            other => write!(f, "{}s", other.as_secs()),
        }
    }
}

impl FromStr for RefreshInterval {
    type Err = String;

    /// Accepts `10`, `10s`, `30`, `30s`, `60`, `60s`, `1m` and `1min`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let secs = match raw.as_str() {
            "1m" | "1min" => Some(60),
            other => other.trim_end_matches('s').parse::<u64>().ok(),
        };

        secs.and_then(RefreshInterval::from_secs)
            .ok_or_else(|| format!("refresh interval must be 10s, 30s or 60s, got '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the reporting API
    pub base_url: String,

    /// Period between automatic refreshes
    pub refresh_interval: RefreshInterval,

    /// Start with auto-refresh enabled
    pub auto_refresh: bool,

    /// Per-request timeout; `None` leaves the HTTP client's defaults in place
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            refresh_interval: RefreshInterval::default(),
            auto_refresh: true,
            request_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(base_url) = lookup("MONITOR_BASE_URL") {
            config.base_url = base_url;
        }

        if let Some(interval) = lookup("REFRESH_INTERVAL_SECONDS") {
            if let Ok(interval) = interval.parse() {
                config.refresh_interval = interval;
            }
        }

        if let Some(auto_refresh) = lookup("AUTO_REFRESH") {
            config.auto_refresh = auto_refresh.to_lowercase() == "true";
        }

        if let Some(timeout) = lookup("REQUEST_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.request_timeout = Some(Duration::from_secs(seconds));
            }
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("base_url must be an http(s) URL, got '{}'", self.base_url));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err("request_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
