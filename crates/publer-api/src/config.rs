//! Process configuration, read once from the environment at startup.

use publer_jobs::PollOptions;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://app.publer.io/api/v1";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address '{value}': {source}")]
    Listen {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub listen: SocketAddr,
    /// Per-request socket timeout for upstream calls.
    pub request_timeout: Duration,
    /// Attempts for transient network failures, including the first.
    pub max_attempts: u32,
    /// Default wall-clock limit for job polling.
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub batch_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            job_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
            batch_poll_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Read `PUBLER_*` variables. Bad numbers fall back to defaults with a warning; a bad listen
    /// address is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let listen_raw = lookup("PUBLER_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = listen_raw
            .parse()
            .map_err(|source| ConfigError::Listen {
                value: listen_raw.clone(),
                source,
            })?;
        let secs = |key: &str, default: Duration| {
            Duration::from_secs(number(&lookup, key, default.as_secs()))
        };

        Ok(Self {
            base_url: lookup("PUBLER_API_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            listen,
            request_timeout: secs("PUBLER_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            max_attempts: number(&lookup, "PUBLER_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            job_timeout: secs("PUBLER_JOB_TIMEOUT_SECS", defaults.job_timeout),
            poll_interval: secs("PUBLER_POLL_INTERVAL_SECS", defaults.poll_interval),
            batch_poll_interval: secs(
                "PUBLER_BATCH_POLL_INTERVAL_SECS",
                defaults.batch_poll_interval,
            ),
        })
    }

    /// Single-job polling defaults, with optional per-call overrides in seconds. A zero
    /// interval is ignored.
    pub fn poll_options(&self, timeout: Option<u64>, poll_interval: Option<u64>) -> PollOptions {
        PollOptions::new(
            timeout.map(Duration::from_secs).unwrap_or(self.job_timeout),
            poll_interval
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(self.poll_interval),
        )
    }

    pub fn batch_poll_options(
        &self,
        timeout: Option<u64>,
        poll_interval: Option<u64>,
    ) -> PollOptions {
        PollOptions::new(
            timeout.map(Duration::from_secs).unwrap_or(self.job_timeout),
            poll_interval
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(self.batch_poll_interval),
        )
    }
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "ignoring unparseable setting");
            default
        }),
    }
}
