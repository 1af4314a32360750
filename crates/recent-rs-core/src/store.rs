//! Persistence collaborators used by attachments.
//!
//! Stores own record storage. Attachments only ever call `save` and
//! `find_by_key`; they never manage connections or transactions.

use crate::error::StoreError;
use crate::model::{Record, RecordKey, Revision};
use async_trait::async_trait;

/// Blocking record store.
pub trait RecordStore<R: Record>: Send + Sync {
    /// Persist `record` and return it stamped with its new revision.
    ///
    /// With `expected = Some(rev)` the save fails with [`StoreError::Conflict`]
    /// when the stored revision is not `rev`. A record that was never stored has
    /// revision 0. `None` overwrites unconditionally.
    fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError>;

    /// Load a record by key.
    fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError>;
}

#[async_trait]
/// Async record store with the same contract as [`RecordStore`].
pub trait AsyncRecordStore<R: Record>: Send + Sync {
    /// Persist `record` and return it stamped with its new revision.
    async fn save(&self, record: R, expected: Option<Revision>) -> Result<R, StoreError>;

    /// Load a record by key.
    async fn find_by_key(&self, key: &RecordKey) -> Result<Option<R>, StoreError>;
}
