//! Sharded JSON file store.
//!
//! Each record lives in its own file:
//! `<data_dir>/<collection>/<id[0..2]>/<id[2..4]>/<id>.json`
//!
//! The file holds a serialised [`StoredRecord`] (version, sequence, body). Writes go to a
//! sibling `.tmp` file first and are renamed into place, so readers never observe a partially
//! written record. A store-wide mutex serialises writers within the process; running two
//! processes against the same directory is not supported.

use super::store::{missing_record, stale_version, RecordStore, StoredRecord};
use crate::error::{CareError, CareResult};
use carelink_uuid::EntityId;
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Guards every write and holds the last sequence number handed out.
    write_lock: Mutex<u64>,
}

impl FileStore {
    /// Opens (creating if needed) a file store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CareResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(CareError::StorageDirCreation)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> CareResult<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, id: &EntityId) -> CareResult<PathBuf> {
        Ok(id.sharded_file(&self.collection_dir(collection)?, RECORD_EXTENSION))
    }

    fn read_record(path: &Path) -> CareResult<Option<StoredRecord>> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(CareError::Deserialization),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CareError::StorageRead(e)),
        }
    }

    fn write_record(path: &Path, record: &StoredRecord) -> CareResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(CareError::StorageDirCreation)?;
        }
        let contents = serde_json::to_string_pretty(record).map_err(CareError::Serialization)?;
        let tmp = path.with_extension(format!("{}.tmp", RECORD_EXTENSION));
        fs::write(&tmp, contents).map_err(CareError::StorageWrite)?;
        fs::rename(&tmp, path).map_err(CareError::StorageWrite)
    }

    fn next_seq(last: &mut u64) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        *last = now.max(*last + 1);
        *last
    }
}

/// Collection names become directory names, so only `[a-z0-9_]` is accepted.
fn validate_collection_name(collection: &str) -> CareResult<()> {
    let ok = !collection.is_empty()
        && collection
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'));
    if ok {
        Ok(())
    } else {
        Err(CareError::InvalidInput(format!(
            "invalid collection name '{}'",
            collection
        )))
    }
}

impl RecordStore for FileStore {
    fn insert(&self, collection: &str, id: &EntityId, body: serde_json::Value) -> CareResult<()> {
        let path = self.record_path(collection, id)?;
        let mut last_seq = self
            .write_lock
            .lock()
            .map_err(|_| CareError::StorageLockPoisoned)?;

        if path.exists() {
            return Err(CareError::Conflict(format!(
                "{} record '{}' already exists",
                collection, id
            )));
        }

        let record = StoredRecord {
            version: 1,
            seq: Self::next_seq(&mut last_seq),
            body,
        };
        Self::write_record(&path, &record)
    }

    fn get(&self, collection: &str, id: &EntityId) -> CareResult<Option<StoredRecord>> {
        Self::read_record(&self.record_path(collection, id)?)
    }

    fn update(
        &self,
        collection: &str,
        id: &EntityId,
        expected_version: u64,
        body: serde_json::Value,
    ) -> CareResult<u64> {
        let path = self.record_path(collection, id)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CareError::StorageLockPoisoned)?;

        let mut record =
            Self::read_record(&path)?.ok_or_else(|| missing_record(collection, id))?;
        if record.version != expected_version {
            return Err(stale_version(collection, id, expected_version, record.version));
        }

        record.version += 1;
        record.body = body;
        Self::write_record(&path, &record)?;
        Ok(record.version)
    }

    fn delete(&self, collection: &str, id: &EntityId, expected_version: u64) -> CareResult<()> {
        let path = self.record_path(collection, id)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CareError::StorageLockPoisoned)?;

        let record = Self::read_record(&path)?.ok_or_else(|| missing_record(collection, id))?;
        if record.version != expected_version {
            return Err(stale_version(collection, id, expected_version, record.version));
        }
        fs::remove_file(&path).map_err(CareError::StorageWrite)
    }

    fn scan(&self, collection: &str) -> CareResult<Vec<StoredRecord>> {
        let dir = self.collection_dir(collection)?;
        let mut records = Vec::new();

        let s1_iter = match fs::read_dir(&dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(CareError::StorageRead(e)),
        };

        for s1 in s1_iter {
            let s1_path = s1.map_err(CareError::StorageRead)?.path();
            if !s1_path.is_dir() {
                continue;
            }
            for s2 in fs::read_dir(&s1_path).map_err(CareError::StorageRead)? {
                let s2_path = s2.map_err(CareError::StorageRead)?.path();
                if !s2_path.is_dir() {
                    continue;
                }
                for entry in fs::read_dir(&s2_path).map_err(CareError::StorageRead)? {
                    let path = entry.map_err(CareError::StorageRead)?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                        continue;
                    }
                    match Self::read_record(&path) {
                        Ok(Some(record)) => records.push(record),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!("skipping unreadable record {}: {}", path.display(), e)
                        }
                    }
                }
            }
        }

        records.sort_by_key(|r| r.seq);
        Ok(records)
    }
}
