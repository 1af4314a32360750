//! File-backed record store writing one pretty JSON file per key.

use crate::check_revision;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use recent_rs_core::{AsyncRecordStore, Record, RecordKey, RecordStore, Revision, StoreError};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::OpenOptions;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const KEY_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// File-backed store. Revision checks and writes are serialized by an
/// in-process lock; files are replaced atomically.
#[derive(Debug)]
pub struct FileRecordStore<R> {
    /// Root directory for record files.
    root: PathBuf,
    key_pattern: Regex,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R> FileRecordStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    /// Create a store under `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let key_pattern =
            Regex::new(KEY_PATTERN).map_err(|err| StoreError::Backend(err.to_string()))?;
        info!("initialized file record store (root={})", root.display());
        Ok(Self {
            root,
            key_pattern,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the record file for `key`.
    fn record_path(&self, key: &RecordKey) -> Result<PathBuf, StoreError> {
        if !self.key_pattern.is_match(key.as_str()) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    /// Path to the temporary file used while rewriting `key`.
    fn temp_path(&self, key: &RecordKey) -> PathBuf {
        self.root.join(format!("{key}.json.tmp"))
    }

    fn load(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        let path = self.record_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Rewrite a record file atomically.
    fn write_record(&self, record: &R) -> Result<(), StoreError> {
        let path = self.record_path(record.key())?;
        let temp_path = self.temp_path(record.key());
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            let contents = serde_json::to_string_pretty(record)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(temp_path, path)?;
        Ok(())
    }

    fn put(&self, mut record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        let _guard = self.write_lock.lock();
        let actual = self.load(record.key())?.map_or(0, |stored| stored.revision());
        check_revision(record.key(), expected, actual)?;
        record.set_revision(actual + 1);
        self.write_record(&record)?;
        debug!(
            "saved record file (key={}, revision={})",
            record.key(),
            actual + 1
        );
        Ok(record)
    }
}

impl<R> RecordStore<R> for FileRecordStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.put(record, expected)
    }

    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        self.load(key)
    }
}

#[async_trait]
impl<R> AsyncRecordStore<R> for FileRecordStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.put(record, expected)
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        self.load(key)
    }
}

#[cfg(test)]
mod tests {
    use super::FileRecordStore;
    use pretty_assertions::assert_eq;
    use recent_rs_core::{AsyncRecordStore, Document, RecordKey, RecordStore, StoreError};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn records_round_trip_through_pretty_json() {
        let temp = tempdir().expect("tempdir");
        let store = FileRecordStore::<Document>::new(temp.path()).expect("store");
        let doc = Document::new("fang").with_field("name", json!("Fang"));
        let saved = RecordStore::save(&store, doc, Some(0)).expect("save");
        assert_eq!(saved.revision, 1);

        let contents = std::fs::read_to_string(temp.path().join("fang.json")).expect("file");
        assert!(contents.contains("\n  \"key\": \"fang\""));
        assert!(!temp.path().join("fang.json.tmp").exists());

        let loaded = RecordStore::find_by_key(&store, &RecordKey::new("fang"))
            .expect("find")
            .expect("present");
        assert_eq!(loaded, saved);
    }

    #[test]
    fn stale_revision_conflicts() {
        let temp = tempdir().expect("tempdir");
        let store = FileRecordStore::<Document>::new(temp.path()).expect("store");
        let first = RecordStore::save(&store, Document::new("fang"), None).expect("first");
        RecordStore::save(&store, first.clone(), Some(1)).expect("second");
        let err = RecordStore::save(&store, first, Some(1)).expect_err("stale");
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FileRecordStore::<Document>::new(temp.path().join("nested")).expect("store");
        assert!(store.root().exists());
        for key in ["../escape", "a/b", "", "dot.ted"] {
            let err = RecordStore::save(&store, Document::new(key), None).expect_err("key");
            assert!(matches!(err, StoreError::InvalidKey(_)));
        }
        let generated = RecordKey::generate();
        assert!(
            RecordStore::find_by_key(&store, &generated)
                .expect("uuid keys are valid")
                .is_none()
        );
    }

    #[test]
    fn corrupt_files_surface_serde_errors() {
        let temp = tempdir().expect("tempdir");
        let store = FileRecordStore::<Document>::new(temp.path()).expect("store");
        std::fs::write(temp.path().join("fang.json"), "{ not json").expect("write");
        let err = RecordStore::find_by_key(&store, &RecordKey::new("fang")).expect_err("corrupt");
        assert!(matches!(err, StoreError::Serde(_)));
    }

    #[tokio::test]
    async fn async_save_persists_across_instances() {
        let temp = tempdir().expect("tempdir");
        let store = FileRecordStore::<Document>::new(temp.path()).expect("store");
        AsyncRecordStore::save(&store, Document::new("fang"), None)
            .await
            .expect("save");
        let reopened = FileRecordStore::<Document>::new(temp.path()).expect("reopen");
        let found = AsyncRecordStore::find_by_key(&reopened, &RecordKey::new("fang"))
            .await
            .expect("find");
        assert_eq!(found.map(|doc| doc.revision), Some(1));
    }
}
