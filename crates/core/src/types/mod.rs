//! Core types for Chef's Journal.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod family_id;
pub mod id;
pub mod phone;
pub mod price;
pub mod status;

pub use family_id::{FamilyId, FamilyIdError};
pub use id::*;
pub use phone::{PhoneError, PhoneNumber};
pub use price::Cost;
pub use status::*;
