//! Chef's Journal Core - Shared domain library.
//!
//! This crate provides the types and rules used across all Chef's Journal
//! components:
//! - `server` - Family document store and HTTP API
//! - `client` - Sync client with local cache
//! - `cli` - Command-line tools for migrations and the sync client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Time is always passed in, which keeps
//! lock leases and merges deterministic under test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, phone numbers, family codes, costs
//! - [`state`] - The synchronized family payload (`AppState`)
//! - [`merge`] - Merge-on-write rules applied when a client pushes
//! - [`family`] - Family documents, accounts, join requests
//! - [`plan`] - Plan editing and lease-based plan locks
//! - [`shopping`] - Shopping list grouping with one cart record per group

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod family;
pub mod merge;
pub mod plan;
pub mod shopping;
pub mod state;
pub mod types;

pub use error::DomainError;
pub use family::{Family, JoinRequest, User};
pub use state::*;
pub use types::*;
