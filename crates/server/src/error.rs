//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use chefs_journal_core::DomainError;

use crate::ai::AiError;
use crate::db::{Entity, StoreError};

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A domain rule rejected the request.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// AI proxy operation failed.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

const fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::PlanLocked { .. } | DomainError::NotLockHolder { .. } => StatusCode::CONFLICT,
        DomainError::PlanNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::RequestNotPending(_)
        | DomainError::AlreadyMember
        | DomainError::DuplicateRequest => StatusCode::BAD_REQUEST,
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => match err {
                StoreError::Database(_) | StoreError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                // An unknown request id is a malformed approval, not a missing page.
                StoreError::NotFound(Entity::JoinRequest) => StatusCode::BAD_REQUEST,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::Domain(domain) => domain_status(domain),
            },
            Self::Domain(err) => domain_status(err),
            Self::Ai(err) => match err {
                AiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                AiError::Upstream { status, .. } => *status,
                AiError::Http(_) | AiError::Parse(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Store(StoreError::Database(_) | StoreError::DataCorruption(_))
                | Self::Ai(AiError::Http(_) | AiError::Parse(_))
        )
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Store(StoreError::Database(_) | StoreError::DataCorruption(_))
            | Self::Internal(_) => "Internal server error".to_string(),
            Self::Store(StoreError::NotFound(Entity::JoinRequest)) => "Invalid request".to_string(),
            Self::Store(StoreError::NotFound(entity)) => format!("{entity} not found"),
            Self::Store(StoreError::Conflict(msg)) => msg.clone(),
            Self::Store(StoreError::Domain(err)) | Self::Domain(err) => err.to_string(),
            Self::Ai(AiError::NotConfigured) => "API key not configured.".to_string(),
            Self::Ai(AiError::Upstream { message, .. }) => message.clone(),
            Self::Ai(_) => "External service error".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
