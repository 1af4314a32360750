//! In-memory record store.

use crate::check_revision;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use recent_rs_core::{AsyncRecordStore, Record, RecordKey, RecordStore, Revision, StoreError};
use std::collections::HashMap;

/// Map-backed store. Saves are linearized by a write lock.
#[derive(Debug)]
pub struct MemoryRecordStore<R> {
    records: RwLock<HashMap<RecordKey, R>>,
}

impl<R> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: Record> MemoryRecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Keys of all stored records, unordered.
    pub fn keys(&self) -> Vec<RecordKey> {
        self.records.read().keys().cloned().collect()
    }

    fn put(&self, mut record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        let mut records = self.records.write();
        let actual = records.get(record.key()).map_or(0, Record::revision);
        check_revision(record.key(), expected, actual)?;
        record.set_revision(actual + 1);
        records.insert(record.key().clone(), record.clone());
        debug!(
            "saved record in memory (key={}, revision={})",
            record.key(),
            actual + 1
        );
        Ok(record)
    }

    fn get(&self, key: &RecordKey) -> Option<R> {
        self.records.read().get(key).cloned()
    }
}

impl<R: Record> RecordStore<R> for MemoryRecordStore<R> {
    fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.put(record, expected)
    }

    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        Ok(self.get(key))
    }
}

#[async_trait]
impl<R: Record> AsyncRecordStore<R> for MemoryRecordStore<R> {
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.put(record, expected)
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        Ok(self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryRecordStore;
    use pretty_assertions::assert_eq;
    use recent_rs_core::{AsyncRecordStore, Document, RecordKey, RecordStore, StoreError};
    use serde_json::json;

    #[test]
    fn save_assigns_increasing_revisions() {
        let store = MemoryRecordStore::new();
        let doc = RecordStore::save(&store, Document::new("fang"), Some(0)).expect("first");
        assert_eq!(doc.revision, 1);
        let doc = RecordStore::save(&store, doc.with_field("name", json!("Fang")), Some(1))
            .expect("second");
        assert_eq!(doc.revision, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.keys(), vec![RecordKey::new("fang")]);
    }

    #[test]
    fn stale_revision_conflicts() {
        let store = MemoryRecordStore::new();
        let doc = RecordStore::save(&store, Document::new("fang"), None).expect("first");
        RecordStore::save(&store, doc.clone(), Some(doc.revision)).expect("second");
        let err = RecordStore::save(&store, doc, Some(1)).expect_err("stale");
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        let err = RecordStore::save(&store, Document::new("new"), Some(3)).expect_err("absent");
        assert!(matches!(err, StoreError::Conflict { actual: 0, .. }));
    }

    #[tokio::test]
    async fn async_find_returns_saved_record() {
        let store = MemoryRecordStore::<Document>::new();
        assert!(store.is_empty());
        AsyncRecordStore::save(&store, Document::new("fang"), None)
            .await
            .expect("save");
        let found = AsyncRecordStore::find_by_key(&store, &RecordKey::new("fang"))
            .await
            .expect("find");
        assert_eq!(found.map(|doc| doc.revision), Some(1));
        let missing = AsyncRecordStore::<Document>::find_by_key(&store, &RecordKey::new("x"))
            .await
            .expect("find");
        assert!(missing.is_none());
    }
}
