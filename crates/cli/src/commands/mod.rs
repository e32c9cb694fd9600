//! Command implementations.

pub mod account;
pub mod family;
pub mod migrate;
pub mod plan;
pub mod shopping;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use chefs_journal_client::{Account, CacheError, ClientConfig, ClientError, LocalCache, SyncApi};

/// Errors shared by the client-side commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Talking to the server failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Local cache access failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// No phone number remembered from a previous `cj login`.
    #[error("Not logged in. Run `cj login <phone>` first")]
    NotLoggedIn,

    /// A command-line argument did not parse.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server client and cache shared by every command.
pub struct Context {
    pub api: Arc<SyncApi>,
    pub cache: LocalCache,
    pub config: ClientConfig,
}

impl Context {
    /// Load client config, optionally overriding the server URL.
    ///
    /// # Errors
    ///
    /// Returns error if the config or cache directory is unusable.
    pub async fn open(server: Option<String>) -> Result<Self, CommandError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(server) = server {
            config.base_url = server;
        }
        let api = Arc::new(SyncApi::new(&config.base_url)?);
        let cache = LocalCache::open(config.cache_dir.clone()).await?;
        Ok(Self { api, cache, config })
    }

    /// The logged-in account, refreshed from the server.
    ///
    /// Login is idempotent for existing phones, so this also picks up a
    /// family change made by an approval.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::NotLoggedIn` without a remembered phone.
    pub async fn account(&self) -> Result<Account, CommandError> {
        let phone = self.cache.phone().await?.ok_or(CommandError::NotLoggedIn)?;
        let account = self.api.login(phone.as_str(), None).await?;
        self.cache.set_family_id(&account.current_family_id).await?;
        Ok(account)
    }
}

/// Print a value as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
