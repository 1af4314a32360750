//! Public SDK surface for recent-rs.
//!
//! This crate re-exports the core building blocks and provides a small
//! initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use recent_rs_config as config;
/// Re-export for convenience.
pub use recent_rs_core as core;
/// Re-export for convenience.
pub use recent_rs_store as store;

pub use recent_rs_config::{ConfigError, RecentConfig};
pub use recent_rs_core::{
    Attachment, ConcurrencyGuard, Document, DocumentCollection, Entry, FieldDef, FieldType,
    RecencyList, RecentError, RecentOptions, RecentPolicy, Record, RecordKey, RecordSchema,
    Revision, StoreError, StoredList, StructFieldAccessor,
};
pub use recent_rs_store::{FileRecordStore, MemoryRecordStore};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
    log::debug!("recent-rs logging initialized");
}
