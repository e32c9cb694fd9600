//! Application state shared across handlers.

use std::sync::Arc;

use chrono::Duration;

use crate::ai::{AiError, GeminiClient};
use crate::config::ServerConfig;
use crate::db::Store;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the document store, the AI client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    ai: GeminiClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the AI client cannot be built.
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Result<Self, AiError> {
        let ai = GeminiClient::new(&config.gemini)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, store, ai }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the AI proxy client.
    #[must_use]
    pub fn ai(&self) -> &GeminiClient {
        &self.inner.ai
    }

    /// Lease granted to plan locks.
    #[must_use]
    pub fn lock_lease(&self) -> Duration {
        self.inner.config.lock_lease
    }
}
