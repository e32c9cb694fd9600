//! Family document store.
//!
//! # Backends
//!
//! - [`PgStore`] - `PostgreSQL`; writes to one family run in a transaction
//!   holding the family row lock (`SELECT ... FOR UPDATE`)
//! - [`MemoryStore`] - process-local maps behind one mutex, for tests and demos
//!
//! ## Tables
//!
//! - `users` - Global accounts, unique by phone number
//! - `families` - One JSON document per family plus member phones and owner
//! - `join_requests` - Requests to move into another family
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p chefs-journal-cli -- migrate
//! ```

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use chefs_journal_core::{DomainError, Family, FamilyId, JoinRequest, JoinRequestId, PhoneNumber, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Kinds of records a lookup can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Family,
    JoinRequest,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Family => "family",
            Self::JoinRequest => "join request",
        })
    }
}

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(Entity),

    /// Constraint violation (e.g., unique phone number).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A domain rule rejected the change; nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A change applied to a family document inside the store's write lock.
///
/// Returning an error aborts the write.
pub type FamilyUpdate = Box<dyn FnOnce(&mut Family) -> Result<(), DomainError> + Send>;

/// Persistence for accounts, family documents and join requests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Look up an account by phone number.
    async fn find_user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, StoreError>;

    /// Create an account together with the family it starts in.
    ///
    /// Fails with [`StoreError::Conflict`] if the phone is already registered.
    async fn create_user_with_family(&self, user: &User, family: &Family) -> Result<(), StoreError>;

    /// Load a family document.
    async fn family(&self, id: &FamilyId) -> Result<Option<Family>, StoreError>;

    /// Apply `update` to a family document under the family's write lock.
    ///
    /// A missing family is created empty first when `create_missing` is set,
    /// otherwise the call fails with [`StoreError::NotFound`].
    async fn update_family(
        &self,
        id: &FamilyId,
        create_missing: bool,
        update: FamilyUpdate,
    ) -> Result<Family, StoreError>;

    /// Store a new join request.
    async fn create_join_request(&self, request: &JoinRequest) -> Result<(), StoreError>;

    /// Whether `phone` already has a pending request into `family`.
    async fn has_pending_request(
        &self,
        phone: &PhoneNumber,
        family: &FamilyId,
    ) -> Result<bool, StoreError>;

    /// Pending requests into `family`, oldest first.
    async fn pending_requests(&self, family: &FamilyId) -> Result<Vec<JoinRequest>, StoreError>;

    /// Approve a pending request and move the requester into the target
    /// family, as one atomic write.
    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        now: DateTime<Utc>,
    ) -> Result<JoinRequest, StoreError>;

    /// Reject a pending request.
    async fn reject_join_request(&self, id: JoinRequestId) -> Result<JoinRequest, StoreError>;
}

/// The records an approval rewrites.
pub(crate) struct Approval<'a> {
    pub request: &'a mut JoinRequest,
    pub user: &'a mut User,
    pub source: Option<&'a mut Family>,
    pub target: &'a mut Family,
}

impl Approval<'_> {
    /// Move the requester into the target family.
    ///
    /// The target absorbs the requester's current family data; the requester
    /// leaves the old family's member list and points at the target.
    pub(crate) fn apply(self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.request.approve()?;

        let source_state = self.source.map(|source| {
            source.members.retain(|phone| phone != &self.user.phone_number);
            source.last_updated = now;
            source.data.clone()
        });
        self.target.absorb(source_state, self.user, now);
        self.user.current_family_id = self.target.family_id.clone();
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chefs_journal_core::{AppState, JoinStatus, Recipe, RecipeId};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[test]
    fn test_approval_moves_user_between_families() {
        let phone = PhoneNumber::parse("13900139000").unwrap();
        let mut source = Family::new(FamilyId::parse("AAAA1111").unwrap(), Some(phone.clone()), now());
        source.data = AppState {
            recipes: vec![Recipe {
                id: RecipeId::new("r1"),
                ..Recipe::default()
            }],
            ..AppState::default()
        };
        let mut target = Family::new(FamilyId::parse("BBBB2222").unwrap(), None, now());
        let mut user = User::new(phone.clone(), Some("Bob"), source.family_id.clone(), now());
        let mut request = JoinRequest::new(phone.clone(), "Bob", target.family_id.clone(), now());

        Approval {
            request: &mut request,
            user: &mut user,
            source: Some(&mut source),
            target: &mut target,
        }
        .apply(now())
        .unwrap();

        assert_eq!(request.status, JoinStatus::Approved);
        assert_eq!(user.current_family_id, target.family_id);
        assert!(!source.is_member(&phone));
        assert!(target.is_member(&phone));
        assert_eq!(target.data.recipes.len(), 1);
    }

    #[test]
    fn test_approval_of_resolved_request_fails() {
        let phone = PhoneNumber::parse("1").unwrap();
        let mut target = Family::new(FamilyId::generate(), None, now());
        let mut user = User::new(phone.clone(), None, FamilyId::generate(), now());
        let mut request = JoinRequest::new(phone, "x", target.family_id.clone(), now());
        request.reject().unwrap();

        let result = Approval {
            request: &mut request,
            user: &mut user,
            source: None,
            target: &mut target,
        }
        .apply(now());
        assert_eq!(result, Err(DomainError::RequestNotPending(JoinStatus::Rejected)));
        assert!(target.members.is_empty());
    }
}
