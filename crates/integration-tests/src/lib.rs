//! Integration tests for Chef's Journal.
//!
//! Every test drives the real router against the in-memory store, either
//! in-process through `tower::ServiceExt::oneshot` or, for the client crate,
//! over a loopback socket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p chefs-journal-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `accounts_sync` - Login, pull and merge-on-write push
//! - `family_join` - Join requests and family merges
//! - `plans_shopping` - Plan locks, cooking and shopping records
//! - `client_session` - `SyncApi` and `SyncSession` against a live server

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use chefs_journal_server::config::ServerConfig;
use chefs_journal_server::db::MemoryStore;
use chefs_journal_server::state::AppState;

/// A router over a fresh in-memory store.
pub struct TestApp {
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build the app with default in-memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::in_memory())
    }

    /// Build the app with a custom configuration.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let state = AppState::new(config, Arc::new(MemoryStore::new())).unwrap();
        Self {
            router: chefs_journal_server::app(state),
        }
    }

    /// Send a request and return the raw response.
    pub async fn response(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and return the status and JSON body (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.response(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// `GET uri`.
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// `POST uri` with a JSON body.
    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the `user` object.
    pub async fn login(&self, phone: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/login",
                &serde_json::json!({ "phone": phone, "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["user"].clone()
    }

    /// Pull a family's document.
    pub async fn pull(&self, family_id: &str) -> Value {
        let (status, body) = self.get(&format!("/api/sync?familyId={family_id}")).await;
        assert_eq!(status, StatusCode::OK, "pull failed: {body}");
        body["data"].clone()
    }

    /// Push a document for merge-on-write.
    pub async fn push(&self, family_id: &str, data: Value) {
        let (status, body) = self
            .post(
                "/api/sync",
                &serde_json::json!({ "familyId": family_id, "data": data }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "push failed: {body}");
    }

    /// Serve the app on a loopback port and return its base URL.
    pub async fn serve(self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, self.router).await });
        format!("http://{addr}")
    }
}

/// The family id string of a logged-in `user` object.
#[must_use]
pub fn family_of(user: &Value) -> String {
    user["currentFamilyId"].as_str().unwrap().to_string()
}
