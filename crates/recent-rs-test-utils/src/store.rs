use async_trait::async_trait;
use parking_lot::Mutex;
use recent_rs_core::{AsyncRecordStore, Record, RecordKey, RecordStore, Revision, StoreError};
use recent_rs_store::MemoryRecordStore;

/// Store whose saves always fail with a backend error. Lookups are served from
/// records seeded with [`FailingStore::with_record`].
pub struct FailingStore<R> {
    message: String,
    records: MemoryRecordStore<R>,
}

impl<R: Record> FailingStore<R> {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            records: MemoryRecordStore::new(),
        }
    }

    /// Seed a record that lookups will return.
    pub fn with_record(self, record: R) -> Result<Self, StoreError> {
        RecordStore::save(&self.records, record, None)?;
        Ok(self)
    }
}

impl<R: Record> RecordStore<R> for FailingStore<R> {
    fn save(&self, _record: R, _expected: Option<Revision>) -> Result<R, StoreError> {
        Err(StoreError::Backend(self.message.clone()))
    }

    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        RecordStore::find_by_key(&self.records, key)
    }
}

#[async_trait]
impl<R: Record> AsyncRecordStore<R> for FailingStore<R> {
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        RecordStore::save(self, record, expected)
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        RecordStore::find_by_key(self, key)
    }
}

/// Memory store that simulates a concurrent writer: before each of the next
/// `conflicts` revision-checked saves it bumps the stored revision, so the save
/// conflicts.
pub struct ConflictingStore<R> {
    inner: MemoryRecordStore<R>,
    remaining: Mutex<usize>,
    injected: Mutex<usize>,
}

impl<R: Record> ConflictingStore<R> {
    pub fn new(conflicts: usize) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            remaining: Mutex::new(conflicts),
            injected: Mutex::new(0),
        }
    }

    /// Conflicts still to be injected.
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    /// Conflicts injected so far.
    pub fn injected(&self) -> usize {
        *self.injected.lock()
    }

    pub fn inner(&self) -> &MemoryRecordStore<R> {
        &self.inner
    }

    fn interfere(&self, key: &RecordKey, expected: Option<Revision>) -> Result<(), StoreError> {
        if expected.is_none() {
            return Ok(());
        }
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return Ok(());
        }
        if let Some(stored) = RecordStore::find_by_key(&self.inner, key)? {
            RecordStore::save(&self.inner, stored, None)?;
            *remaining -= 1;
            *self.injected.lock() += 1;
        }
        Ok(())
    }
}

impl<R: Record> RecordStore<R> for ConflictingStore<R> {
    fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.interfere(record.key(), expected)?;
        RecordStore::save(&self.inner, record, expected)
    }

    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        RecordStore::find_by_key(&self.inner, key)
    }
}

#[async_trait]
impl<R: Record> AsyncRecordStore<R> for ConflictingStore<R> {
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        RecordStore::save(self, record, expected)
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        RecordStore::find_by_key(self, key)
    }
}

/// A call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Save {
        key: RecordKey,
        expected: Option<Revision>,
    },
    Find {
        key: RecordKey,
    },
}

/// Memory store that logs every call it receives.
pub struct RecordingStore<R> {
    inner: MemoryRecordStore<R>,
    calls: Mutex<Vec<StoreCall>>,
}

impl<R: Record> Default for RecordingStore<R> {
    fn default() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl<R: Record> RecordingStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of `save` calls seen so far.
    pub fn saves(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, StoreCall::Save { .. }))
            .count()
    }

    pub fn inner(&self) -> &MemoryRecordStore<R> {
        &self.inner
    }
}

impl<R: Record> RecordStore<R> for RecordingStore<R> {
    fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        self.calls.lock().push(StoreCall::Save {
            key: record.key().clone(),
            expected,
        });
        RecordStore::save(&self.inner, record, expected)
    }

    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        self.calls.lock().push(StoreCall::Find { key: key.clone() });
        RecordStore::find_by_key(&self.inner, key)
    }
}

#[async_trait]
impl<R: Record> AsyncRecordStore<R> for RecordingStore<R> {
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError> {
        RecordStore::save(self, record, expected)
    }

    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError> {
        RecordStore::find_by_key(self, key)
    }
}
