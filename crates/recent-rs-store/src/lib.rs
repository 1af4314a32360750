//! Reference record stores for recency attachments.
//!
//! Both stores implement the blocking and async store traits and enforce the
//! expected-revision check used by optimistic concurrency.

mod file;
mod memory;

/// One pretty JSON file per record key.
pub use file::FileRecordStore;
/// Process-local map store.
pub use memory::MemoryRecordStore;

use recent_rs_core::{RecordKey, Revision, StoreError};

/// Fail with a conflict when `expected` is set and differs from `actual`.
fn check_revision(
    key: &RecordKey,
    expected: Option<Revision>,
    actual: Revision,
) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != actual => Err(StoreError::Conflict {
            key: key.clone(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
