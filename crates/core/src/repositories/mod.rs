//! Record storage.
//!
//! This module contains the [`RecordStore`] seam the services are written against, the typed
//! [`Repository`] wrapper, and the two store implementations.

pub mod file;
pub mod memory;
pub mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{Entity, RecordStore, Repository, StoredRecord, Versioned};
