//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Storage
//! - `JOURNAL_STORE` - `postgres` (default) or `memory`
//! - `JOURNAL_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`); required unless `JOURNAL_STORE=memory`
//!
//! ## Optional
//! - `JOURNAL_HOST` - Bind address (default: 127.0.0.1)
//! - `JOURNAL_PORT` - Listen port (default: 3000)
//! - `JOURNAL_LOCK_LEASE_SECS` - Plan lock lease in seconds (default: 1800)
//! - `JOURNAL_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `GEMINI_API_KEY` - Key for the AI proxy; `/api/ai` answers 500 without it
//! - `GEMINI_TEXT_MODEL` - Text model (default: gemini-2.5-flash)
//! - `GEMINI_IMAGE_MODEL` - Image model (default: gemini-2.5-flash-image)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where family documents live.
#[derive(Clone)]
pub enum StoreBackend {
    Postgres { database_url: SecretString },
    Memory,
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

impl StoreBackend {
    /// Pick the backend from `JOURNAL_STORE` and the database URL, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown store kind, or for `postgres`
    /// without a database URL.
    pub fn select(
        kind: Option<&str>,
        database_url: Option<SecretString>,
    ) -> Result<Self, ConfigError> {
        match kind.map(str::trim).unwrap_or("postgres") {
            "memory" => Ok(Self::Memory),
            "postgres" => database_url
                .map(|database_url| Self::Postgres { database_url })
                .ok_or_else(|| ConfigError::MissingEnvVar("JOURNAL_DATABASE_URL".to_string())),
            other => Err(ConfigError::InvalidEnvVar(
                "JOURNAL_STORE".to_string(),
                format!("unknown store '{other}', expected 'postgres' or 'memory'"),
            )),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Document store backend
    pub store: StoreBackend,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Lease granted when a plan is locked
    pub lock_lease: Duration,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// AI proxy configuration
    pub gemini: GeminiConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Gemini API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<SecretString>,
    pub text_model: String,
    pub image_model: String,
    /// API root, overridable for tests
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let store = StoreBackend::select(
            get_optional_env("JOURNAL_STORE").as_deref(),
            get_database_url("JOURNAL_DATABASE_URL"),
        )?;
        let host: IpAddr = parse_env_or_default("JOURNAL_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("JOURNAL_PORT", "3000")?;
        let lease_secs: i64 = parse_env_or_default("JOURNAL_LOCK_LEASE_SECS", "1800")?;
        if lease_secs <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "JOURNAL_LOCK_LEASE_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }
        let cors_origins = parse_origins(get_optional_env("JOURNAL_CORS_ORIGINS").as_deref());

        Ok(Self {
            store,
            host,
            port,
            lock_lease: Duration::seconds(lease_secs),
            cors_origins,
            gemini: GeminiConfig::from_env(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// An in-memory configuration with defaults, used by tests and demos.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: StoreBackend::Memory,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            lock_lease: chefs_journal_core::plan::DEFAULT_LOCK_LEASE,
            cors_origins: Vec::new(),
            gemini: GeminiConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GeminiConfig {
    fn from_env() -> Self {
        Self {
            api_key: get_optional_env("GEMINI_API_KEY")
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            text_model: get_env_or_default("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL),
            image_model: get_env_or_default("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_select_memory_store() {
        let backend = StoreBackend::select(Some("memory"), None).unwrap();
        assert!(matches!(backend, StoreBackend::Memory));
    }

    #[test]
    fn test_select_postgres_requires_url() {
        let err = StoreBackend::select(None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));

        let backend =
            StoreBackend::select(Some("postgres"), Some(SecretString::from("postgres://db")))
                .unwrap();
        assert!(matches!(backend, StoreBackend::Postgres { .. }));
    }

    #[test]
    fn test_select_unknown_store() {
        let err = StoreBackend::select(Some("mongo"), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_parse_origins() {
        assert!(parse_origins(None).is_empty());
        assert_eq!(
            parse_origins(Some("http://a.test, ,http://b.test ")),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 8080,
            ..ServerConfig::in_memory()
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ServerConfig {
            store: StoreBackend::Postgres {
                database_url: SecretString::from("postgres://user:hunter2@db/journal"),
            },
            gemini: GeminiConfig {
                api_key: Some(SecretString::from("super_secret_gemini_key")),
                ..GeminiConfig::default()
            },
            ..ServerConfig::in_memory()
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains(DEFAULT_TEXT_MODEL));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("super_secret_gemini_key"));
    }
}
