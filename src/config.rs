//! Tracker configuration from environment variables
//!
//! Every setting has a default so the tracker starts with no environment at
//! all. Values that are present but unparseable fail startup instead of being
//! silently replaced.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NTFY_URL: &str = "https://ntfy.sh";
pub const DEFAULT_NTFY_TOPIC: &str = "k8s-restart-tracker";
pub const DEFAULT_CLUSTER_NAME: &str = "kubernetes";
pub const DEFAULT_RESTART_THRESHOLD: u32 = 5;
pub const DEFAULT_TIME_WINDOW_MINUTES: u32 = 60;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NOTIFY_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_LOG_TAIL_LINES: u32 = 50;
pub const DEFAULT_LOG_FETCH_INTERVAL_SECONDS: u32 = 300;
pub const DEFAULT_LOG_FETCH_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_EVICTION_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_EVICTION_GRACE_MINUTES: u32 = 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("LOG_SOURCE must be one of kubectl, api, none; got {0:?}")]
    InvalidLogSource(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Where container logs are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSourceKind {
    Kubectl,
    Api,
    Disabled,
}

impl FromStr for LogSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubectl" => Ok(LogSourceKind::Kubectl),
            "api" => Ok(LogSourceKind::Api),
            "none" | "off" | "disabled" => Ok(LogSourceKind::Disabled),
            other => Err(ConfigError::InvalidLogSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub ntfy_url: String,
    pub ntfy_topic: String,
    pub cluster_name: String,
    /// Restart count at or above which a container is tracked and alerted on
    pub restart_threshold: u32,
    pub time_window: chrono::Duration,
    pub port: u16,
    pub notify_timeout: Duration,
    pub log_source: LogSourceKind,
    pub log_tail_lines: i64,
    pub log_fetch_interval: chrono::Duration,
    pub log_fetch_timeout: Duration,
    pub eviction_interval: Duration,
    pub eviction_grace: chrono::Duration,
    pub startup_notification: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ntfy_url: DEFAULT_NTFY_URL.to_string(),
            ntfy_topic: DEFAULT_NTFY_TOPIC.to_string(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
            time_window: chrono::Duration::minutes(i64::from(DEFAULT_TIME_WINDOW_MINUTES)),
            port: DEFAULT_PORT,
            notify_timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECONDS),
            log_source: LogSourceKind::Kubectl,
            log_tail_lines: i64::from(DEFAULT_LOG_TAIL_LINES),
            log_fetch_interval: chrono::Duration::seconds(i64::from(
                DEFAULT_LOG_FETCH_INTERVAL_SECONDS,
            )),
            log_fetch_timeout: Duration::from_secs(DEFAULT_LOG_FETCH_TIMEOUT_SECONDS),
            eviction_interval: Duration::from_secs(DEFAULT_EVICTION_INTERVAL_SECONDS),
            eviction_grace: chrono::Duration::minutes(i64::from(DEFAULT_EVICTION_GRACE_MINUTES)),
            startup_notification: true,
        }
    }
}

impl TrackerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary lookup
    ///
    /// Tests pass a map here instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |var: &str, default: String| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        let time_window_minutes =
            number(&lookup, "TIME_WINDOW_MINUTES", DEFAULT_TIME_WINDOW_MINUTES)?;
        if time_window_minutes == 0 {
            return Err(ConfigError::Zero("TIME_WINDOW_MINUTES"));
        }
        let eviction_interval =
            number(&lookup, "EVICTION_INTERVAL_SECONDS", DEFAULT_EVICTION_INTERVAL_SECONDS)?;
        if eviction_interval == 0 {
            return Err(ConfigError::Zero("EVICTION_INTERVAL_SECONDS"));
        }

        let notify_timeout =
            number(&lookup, "NOTIFY_TIMEOUT_SECONDS", DEFAULT_NOTIFY_TIMEOUT_SECONDS)?;
        if notify_timeout == 0 {
            return Err(ConfigError::Zero("NOTIFY_TIMEOUT_SECONDS"));
        }
        let log_fetch_timeout =
            number(&lookup, "LOG_FETCH_TIMEOUT_SECONDS", DEFAULT_LOG_FETCH_TIMEOUT_SECONDS)?;
        if log_fetch_timeout == 0 {
            return Err(ConfigError::Zero("LOG_FETCH_TIMEOUT_SECONDS"));
        }

        let log_source = match lookup("LOG_SOURCE").filter(|v| !v.trim().is_empty()) {
            Some(value) => value.parse()?,
            None => defaults.log_source,
        };

        Ok(Self {
            ntfy_url: text("NTFY_URL", defaults.ntfy_url),
            ntfy_topic: text("NTFY_TOPIC", defaults.ntfy_topic),
            cluster_name: text("CLUSTER_NAME", defaults.cluster_name),
            restart_threshold: number(&lookup, "RESTART_THRESHOLD", DEFAULT_RESTART_THRESHOLD)?,
            time_window: chrono::Duration::minutes(i64::from(time_window_minutes)),
            port: number(&lookup, "PORT", DEFAULT_PORT)?,
            notify_timeout: Duration::from_secs(notify_timeout),
            log_source,
            log_tail_lines: i64::from(number(&lookup, "LOG_TAIL_LINES", DEFAULT_LOG_TAIL_LINES)?),
            log_fetch_interval: chrono::Duration::seconds(i64::from(number(
                &lookup,
                "LOG_FETCH_INTERVAL_SECONDS",
                DEFAULT_LOG_FETCH_INTERVAL_SECONDS,
            )?)),
            log_fetch_timeout: Duration::from_secs(log_fetch_timeout),
            eviction_interval: Duration::from_secs(eviction_interval),
            eviction_grace: chrono::Duration::minutes(i64::from(number(
                &lookup,
                "EVICTION_GRACE_MINUTES",
                DEFAULT_EVICTION_GRACE_MINUTES,
            )?)),
            startup_notification: boolean(&lookup, "STARTUP_NOTIFICATION", true)?,
        })
    }

    /// Window length in whole minutes, as shown in notifications
    pub fn time_window_minutes(&self) -> i64 {
        self.time_window.num_minutes()
    }
}

fn number<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { var, value: raw })
}

fn boolean<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value: raw }),
    }
}
