//! # Carelink Core
//!
//! The care-access coordination engine:
//! - one-time-code identity challenges and code-based login ([`identity`], [`auth`]),
//! - rule-based practitioner matching with persisted audit runs ([`matching`]),
//! - the practitioner availability ledger and slot claims ([`availability`]),
//! - booking and referral lifecycles ([`booking`], [`referral`]), session notes and reviews.
//!
//! Storage is reached only through the [`RecordStore`] trait; [`FileStore`] keeps sharded JSON
//! files under `CARE_DATA_DIR`, [`MemoryStore`] serves tests.
//!
//! **No API concerns**: HTTP/gRPC servers, request authentication and status mapping belong in
//! `api-rest`, `api-grpc` and `api-shared`.

pub mod auth;
pub mod availability;
pub mod booking;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod identity;
pub mod matching;
pub mod notify;
pub mod pagination;
pub mod referral;
pub mod repositories;
pub mod reviews;
pub mod session_notes;
pub mod shared;
pub mod tokens;
pub mod validation;

pub use capabilities::{Actor, Operation};
pub use config::{ChallengeLookup, CoreConfig, Environment};
pub use error::{CareError, CareResult, ErrorKind};
pub use pagination::{Page, PageMeta, PageRequest};
pub use repositories::{FileStore, MemoryStore, RecordStore};
pub use shared::CareServices;

pub use carelink_types::{NonEmptyText, Role, TextError};
pub use carelink_uuid::{EntityId, TimestampId};
