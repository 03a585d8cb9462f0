//! Record store abstraction.
//!
//! The core never talks to a storage engine directly. It sees a [`RecordStore`]: an
//! object-safe, per-collection key/value store of JSON bodies with:
//! - `insert` that fails with [`CareError::Conflict`] on a duplicate id,
//! - `update`/`delete` guarded by an expected version (compare-and-swap),
//! - `scan` returning every record of a collection in insertion order.
//!
//! [`Repository`] layers typed access for one [`Entity`] type over a shared store.

use crate::error::{CareError, CareResult};
use carelink_uuid::EntityId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A raw stored record.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredRecord {
    /// Starts at 1 and increments on every successful update.
    pub version: u64,
    /// Insertion sequence; defines enumeration order within a collection.
    pub seq: u64,
    pub body: serde_json::Value,
}

/// Durable (or in-memory) per-collection record storage.
///
/// Implementations must make each call atomic with respect to other calls on the same store.
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// Inserts a new record at version 1.
    fn insert(&self, collection: &str, id: &EntityId, body: serde_json::Value) -> CareResult<()>;

    fn get(&self, collection: &str, id: &EntityId) -> CareResult<Option<StoredRecord>>;

    /// Replaces the body if the stored version equals `expected_version`; returns the new
    /// version.
    fn update(
        &self,
        collection: &str,
        id: &EntityId,
        expected_version: u64,
        body: serde_json::Value,
    ) -> CareResult<u64>;

    /// Removes the record if the stored version equals `expected_version`.
    fn delete(&self, collection: &str, id: &EntityId, expected_version: u64) -> CareResult<()>;

    /// Returns every record of the collection ordered by insertion sequence.
    fn scan(&self, collection: &str) -> CareResult<Vec<StoredRecord>>;
}

/// A type stored in its own collection and keyed by an [`EntityId`].
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name in the record store.
    const COLLECTION: &'static str;
    /// Human-readable name used in `NotFound` messages.
    const LABEL: &'static str;

    fn id(&self) -> EntityId;
}

/// A decoded entity together with the version it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// Typed access to one entity collection.
pub struct Repository<T> {
    store: Arc<dyn RecordStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub fn insert(&self, entity: &T) -> CareResult<()> {
        let body = serde_json::to_value(entity).map_err(CareError::Serialization)?;
        self.store.insert(T::COLLECTION, &entity.id(), body)
    }

    pub fn get(&self, id: &EntityId) -> CareResult<Option<Versioned<T>>> {
        self.store
            .get(T::COLLECTION, id)?
            .map(decode::<T>)
            .transpose()
    }

    /// Like [`Repository::get`] but a missing record is [`CareError::NotFound`].
    pub fn require(&self, id: &EntityId) -> CareResult<Versioned<T>> {
        self.get(id)?
            .ok_or_else(|| CareError::NotFound(format!("{} '{}'", T::LABEL, id)))
    }

    pub fn exists(&self, id: &EntityId) -> CareResult<bool> {
        Ok(self.store.get(T::COLLECTION, id)?.is_some())
    }

    /// Writes `entity` over the record read at `expected_version`.
    pub fn update(&self, expected_version: u64, entity: &T) -> CareResult<Versioned<T>> {
        let body = serde_json::to_value(entity).map_err(CareError::Serialization)?;
        let version = self
            .store
            .update(T::COLLECTION, &entity.id(), expected_version, body)?;
        Ok(Versioned {
            version,
            record: entity.clone(),
        })
    }

    pub fn delete(&self, current: &Versioned<T>) -> CareResult<()> {
        self.store
            .delete(T::COLLECTION, &current.record.id(), current.version)
    }

    /// All records, in insertion order.
    pub fn list(&self) -> CareResult<Vec<T>> {
        Ok(self
            .list_versioned()?
            .into_iter()
            .map(|v| v.record)
            .collect())
    }

    pub fn list_versioned(&self) -> CareResult<Vec<Versioned<T>>> {
        self.store
            .scan(T::COLLECTION)?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    /// Records matching `predicate`, in insertion order.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> CareResult<Vec<T>> {
        Ok(self.list()?.into_iter().filter(|t| predicate(t)).collect())
    }
}

fn decode<T: Entity>(stored: StoredRecord) -> CareResult<Versioned<T>> {
    let record = serde_json::from_value(stored.body).map_err(CareError::Deserialization)?;
    Ok(Versioned {
        version: stored.version,
        record,
    })
}

pub(crate) fn stale_version(collection: &str, id: &EntityId, expected: u64, found: u64) -> CareError {
    CareError::Conflict(format!(
        "{} record '{}' changed concurrently (expected version {}, found {})",
        collection, id, expected, found
    ))
}

pub(crate) fn missing_record(collection: &str, id: &EntityId) -> CareError {
    CareError::NotFound(format!("{} record '{}'", collection, id))
}
