//! Client configuration from environment variables.
//!
//! - `JOURNAL_SERVER_URL` (default `http://127.0.0.1:3000`)
//! - `JOURNAL_CACHE_DIR` (default `.chefs-journal`)
//! - `JOURNAL_PULL_INTERVAL_MS` (default 3000)
//! - `JOURNAL_PUSH_DEBOUNCE_MS` (default 1000)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::session::SyncConfig;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_CACHE_DIR: &str = ".chefs-journal";

/// Where the client talks to and how often it syncs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub pull_interval: Duration,
    pub push_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            pull_interval: sync.pull_interval,
            push_debounce: sync.push_debounce,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if an interval is not a number.
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: std::env::var("JOURNAL_SERVER_URL").unwrap_or(defaults.base_url),
            cache_dir: std::env::var("JOURNAL_CACHE_DIR").map_or(defaults.cache_dir, PathBuf::from),
            pull_interval: millis_or("JOURNAL_PULL_INTERVAL_MS", defaults.pull_interval)?,
            push_debounce: millis_or("JOURNAL_PUSH_DEBOUNCE_MS", defaults.push_debounce)?,
        })
    }

    /// Timer settings for a [`crate::SyncSession`].
    #[must_use]
    pub const fn sync(&self) -> SyncConfig {
        SyncConfig {
            pull_interval: self.pull_interval,
            push_debounce: self.push_debounce,
        }
    }
}

fn millis_or(name: &'static str, default: Duration) -> Result<Duration, ClientError> {
    match std::env::var(name) {
        Ok(raw) => parse_millis(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ClientError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ClientError::InvalidConfig {
            name,
            value: raw.to_string(),
        }),
    }
}
