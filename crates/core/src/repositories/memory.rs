//! In-memory record store, used by tests and ephemeral deployments.

use super::store::{missing_record, stale_version, RecordStore, StoredRecord};
use crate::error::{CareError, CareResult};
use carelink_uuid::EntityId;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Collections {
    next_seq: u64,
    records: HashMap<String, HashMap<EntityId, StoredRecord>>,
}

/// A [`RecordStore`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, collection: &str, id: &EntityId, body: serde_json::Value) -> CareResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CareError::StorageLockPoisoned)?;

        inner.next_seq += 1;
        let seq = inner.next_seq;
        let records = inner.records.entry(collection.to_string()).or_default();
        if records.contains_key(id) {
            return Err(CareError::Conflict(format!(
                "{} record '{}' already exists",
                collection, id
            )));
        }
        records.insert(
            *id,
            StoredRecord {
                version: 1,
                seq,
                body,
            },
        );
        Ok(())
    }

    fn get(&self, collection: &str, id: &EntityId) -> CareResult<Option<StoredRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| CareError::StorageLockPoisoned)?;
        Ok(inner
            .records
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn update(
        &self,
        collection: &str,
        id: &EntityId,
        expected_version: u64,
        body: serde_json::Value,
    ) -> CareResult<u64> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CareError::StorageLockPoisoned)?;
        let record = inner
            .records
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| missing_record(collection, id))?;

        if record.version != expected_version {
            return Err(stale_version(collection, id, expected_version, record.version));
        }
        record.version += 1;
        record.body = body;
        Ok(record.version)
    }

    fn delete(&self, collection: &str, id: &EntityId, expected_version: u64) -> CareResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CareError::StorageLockPoisoned)?;
        let records = inner
            .records
            .get_mut(collection)
            .ok_or_else(|| missing_record(collection, id))?;
        let found = records
            .get(id)
            .map(|r| r.version)
            .ok_or_else(|| missing_record(collection, id))?;

        if found != expected_version {
            return Err(stale_version(collection, id, expected_version, found));
        }
        records.remove(id);
        Ok(())
    }

    fn scan(&self, collection: &str) -> CareResult<Vec<StoredRecord>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| CareError::StorageLockPoisoned)?;
        let mut out: Vec<StoredRecord> = inner
            .records
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|r| r.seq);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_rejects_duplicate_ids() {
        let store = MemoryStore::new();
        let id = EntityId::new();

        store.insert("things", &id, json!({"n": 1})).unwrap();
        let err = store.insert("things", &id, json!({"n": 2})).unwrap_err();

        assert!(matches!(err, CareError::Conflict(_)));
    }

    #[test]
    fn update_is_compare_and_swap() {
        let store = MemoryStore::new();
        let id = EntityId::new();
        store.insert("things", &id, json!({"n": 1})).unwrap();

        assert_eq!(store.update("things", &id, 1, json!({"n": 2})).unwrap(), 2);
        let err = store.update("things", &id, 1, json!({"n": 3})).unwrap_err();
        assert!(matches!(err, CareError::Conflict(_)));

        let current = store.get("things", &id).unwrap().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.body, json!({"n": 2}));
    }

    #[test]
    fn scan_preserves_insertion_order() {
        let store = MemoryStore::new();
        let ids: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();
        for (n, id) in ids.iter().enumerate() {
            store.insert("things", id, json!({ "n": n })).unwrap();
        }

        let scanned: Vec<u64> = store
            .scan("things")
            .unwrap()
            .into_iter()
            .map(|r| r.body["n"].as_u64().unwrap())
            .collect();
        assert_eq!(scanned, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn delete_checks_version_and_existence() {
        let store = MemoryStore::new();
        let id = EntityId::new();
        store.insert("things", &id, json!({})).unwrap();

        assert!(matches!(
            store.delete("things", &id, 7).unwrap_err(),
            CareError::Conflict(_)
        ));
        store.delete("things", &id, 1).unwrap();
        assert!(store.get("things", &id).unwrap().is_none());
        assert!(matches!(
            store.delete("things", &id, 1).unwrap_err(),
            CareError::NotFound(_)
        ));
    }
}
