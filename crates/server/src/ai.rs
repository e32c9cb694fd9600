//! Gemini proxy for recipe text and image generation.
//!
//! The API key stays on the server; clients only send a prompt. Successful
//! responses are cached per (kind, prompt) for one hour with `moka`.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::GeminiConfig;

const CACHE_TTL: Duration = Duration::from_secs(3600);
const CACHE_CAPACITY: u64 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur when calling the generative API.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key is configured on the server.
    #[error("API key not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// What to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiKind {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    error: UpstreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    message: String,
}

/// Client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    text_model: String,
    image_model: String,
    cache: Cache<(AiKind, String), Value>,
}

impl GeminiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &GeminiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                api_key: config.api_key.clone(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                text_model: config.text_model.clone(),
                image_model: config.image_model.clone(),
                cache,
            }),
        })
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.api_key.is_some()
    }

    fn model(&self, kind: AiKind) -> &str {
        match kind {
            AiKind::Text => &self.inner.text_model,
            AiKind::Image => &self.inner.image_model,
        }
    }

    /// Generate content for `prompt` and return the API's JSON response.
    ///
    /// # Errors
    ///
    /// Returns `AiError::NotConfigured` without an API key, and the other
    /// variants when the request or response fails.
    #[instrument(skip(self, prompt), fields(model = %self.model(kind)))]
    pub async fn generate(&self, kind: AiKind, prompt: &str) -> Result<Value, AiError> {
        let api_key = self.inner.api_key.as_ref().ok_or(AiError::NotConfigured)?;

        let cache_key = (kind, prompt.to_string());
        if let Some(hit) = self.inner.cache.get(&cache_key).await {
            debug!("AI response served from cache");
            return Ok(hit);
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.inner.base_url,
            self.model(kind)
        );
        let payload = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let response = self
            .inner
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<UpstreamError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AiError::Upstream { status, message });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| AiError::Parse(format!("Failed to parse response: {e}")))?;
        self.inner.cache.insert(cache_key, value.clone()).await;
        Ok(value)
    }
}
