//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store ping)
//!
//! # Accounts
//! POST /api/auth/login         - Log in by phone, registering on first use
//!
//! # Sync
//! GET  /api/sync?familyId=     - Pull the family document
//! POST /api/sync               - Push local state (merge-on-write)
//!
//! # Family
//! GET  /api/family/request?familyId= - Pending join requests
//! POST /api/family/request     - action = request | approve | reject
//! GET  /api/family/members?familyId= - Member phones and owner
//!
//! # Plans
//! POST /api/plans/toggle       - Add/remove a recipe on a date
//! POST /api/plans/lock         - Lock or unlock a date's plan
//! POST /api/plans/cooked       - Record the plan as cooked
//!
//! # Shopping
//! GET  /api/shopping?familyId=&date= - Grouped shopping list
//! POST /api/shopping           - Update one group's cart record
//!
//! # AI
//! POST /api/ai                 - Gemini proxy
//! ```

pub mod ai;
pub mod auth;
pub mod family;
pub mod health;
pub mod plans;
pub mod shopping;
pub mod sync;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use chefs_journal_core::FamilyId;

use crate::error::AppError;
use crate::state::AppState;

/// Body of read endpoints: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

/// Body of write endpoints: `{"success": true}`, optionally with the result.
#[derive(Debug, Serialize)]
pub struct Success<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Success {
    /// A bare acknowledgement.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            data: None,
        }
    }
}

impl<T> Success<T> {
    /// An acknowledgement carrying the written record.
    #[must_use]
    pub const fn with(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// Parse a required family id, answering 400 with `message` when it is
/// missing or malformed.
pub(crate) fn require_family_id(raw: Option<&str>, message: &str) -> Result<FamilyId, AppError> {
    raw.and_then(|id| FamilyId::parse(id).ok())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(auth::login))
}

/// Create the sync routes router.
pub fn sync_routes() -> Router<AppState> {
    Router::new().route("/", get(sync::pull).post(sync::push))
}

/// Create the family routes router.
pub fn family_routes() -> Router<AppState> {
    Router::new()
        .route("/request", get(family::pending).post(family::handle_action))
        .route("/members", get(family::members))
}

/// Create the plan routes router.
pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/toggle", post(plans::toggle))
        .route("/lock", post(plans::lock))
        .route("/cooked", post(plans::cooked))
}

/// Create the shopping routes router.
pub fn shopping_routes() -> Router<AppState> {
    Router::new().route("/", get(shopping::list).post(shopping::update))
}

/// Create the AI proxy routes router.
pub fn ai_routes() -> Router<AppState> {
    Router::new().route("/", post(ai::generate))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/sync", sync_routes())
        .nest("/api/family", family_routes())
        .nest("/api/plans", plan_routes())
        .nest("/api/shopping", shopping_routes())
        .nest("/api/ai", ai_routes())
}
