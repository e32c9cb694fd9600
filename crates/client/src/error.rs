//! Client error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from talking to the server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The configured server URL is not usable.
    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Environment variable has an invalid value.
    #[error("Invalid value for {name}: {value}")]
    InvalidConfig { name: &'static str, value: String },

    /// Reading or writing the local cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the on-disk cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt cache file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
