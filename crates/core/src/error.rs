//! Domain rule violations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{JoinStatus, UserId};

/// A request that the family's rules do not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The plan for the date is held by another member's active lease.
    #[error("plan for {date} is locked by {holder}")]
    PlanLocked {
        /// Date of the plan.
        date: NaiveDate,
        /// Member holding the lock.
        holder: UserId,
    },

    /// Only the member who locked a plan may unlock it.
    #[error("plan for {date} can only be unlocked by {holder}")]
    NotLockHolder {
        /// Date of the plan.
        date: NaiveDate,
        /// Member holding the lock.
        holder: UserId,
    },

    /// There is no plan for the date.
    #[error("no plan for {0}")]
    PlanNotFound(NaiveDate),

    /// The join request was already resolved.
    #[error("join request is already {0}")]
    RequestNotPending(JoinStatus),

    /// The requester already belongs to the target family.
    #[error("already a member of this family")]
    AlreadyMember,

    /// An identical pending request exists.
    #[error("a join request is already pending")]
    DuplicateRequest,
}
