//! Chef's Journal client library.
//!
//! - [`SyncApi`]: typed HTTP client for the server's JSON API
//! - [`LocalCache`]: per-collection JSON files used as a fallback cache
//! - [`SyncSession`]: background task that pulls on an interval and pushes
//!   local changes after a debounce delay
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chefs_journal_client::{ClientConfig, Identity, LocalCache, SyncApi, SyncSession};
//!
//! let config = ClientConfig::from_env()?;
//! let api = Arc::new(SyncApi::new(&config.base_url)?);
//! let account = api.login("13800138000", Some("Mei")).await?;
//!
//! let cache = LocalCache::open(&config.cache_dir).await?;
//! let mut session = SyncSession::new(api, Identity::from(&account), config.sync())
//!     .with_cache(cache)
//!     .await?;
//! session.start();
//! session.update(|state| state.recipes.clear()).await;
//! session.stop().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod session;

pub use api::{Account, Members, RemoteStore, SyncApi};
pub use cache::LocalCache;
pub use config::ClientConfig;
pub use error::{CacheError, ClientError};
pub use session::{Identity, PullOutcome, SyncConfig, SyncSession};
