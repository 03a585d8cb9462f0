//! Identifier utilities for Carelink records.
//!
//! Every stored entity (challenges, bookings, referrals, slots, match runs, accounts) is keyed by
//! a *canonical* UUID: **32 lowercase hexadecimal characters**, no hyphens. The same string is
//! used on the wire, in the record body and to derive the record's location in the file store.
//!
//! This crate provides:
//! - [`EntityId`], a wrapper that guarantees the canonical form once constructed.
//! - [`TimestampId`], a time-prefixed identifier for ordered, append-only entries (for example
//!   referral note history).
//!
//! ## Sharded layout
//! For a canonical id `u`, the file store keeps the record at:
//! `collection_dir/<u[0..2]>/<u[2..4]>/<u>.json`
//!
//! Example:
//! `care_data/bookings/55/0e/550e8400e29b41d4a716446655440000.json`

mod id;

pub use id::{EntityId, TimestampId};

/// Re-exported for callers that need the raw `uuid::Uuid`.
pub use ::uuid::Uuid;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Input was not a valid identifier.
    #[error("invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
