//! Bounded recently-used lists embedded in persisted records.
//!
//! An attachment adds one recency list field to a parent record and exposes an
//! operation that refreshes or inserts an entry, keeps the list newest-first and
//! truncates it to the configured capacity before saving the parent record.

pub mod accessor;
pub mod attachment;
pub mod clock;
pub mod collection;
pub mod error;
pub mod guard;
pub mod model;
pub mod mutator;
pub mod policy;
pub mod schema;
pub mod store;

/// Field accessor capability and implementations.
pub use accessor::{JsonListAccessor, ListFieldAccessor, StoredList, StructFieldAccessor};
/// Attachment binding policy, accessor and clock.
pub use attachment::Attachment;
/// Time sources.
pub use clock::{Clock, ManualClock, SystemClock};
/// Dynamic document facade with generated operations.
pub use collection::DocumentCollection;
/// Error types.
pub use error::{RecentError, StoreError};
/// Concurrency guard configuration.
pub use guard::ConcurrencyGuard;
/// Record and list model.
pub use model::{Document, Entry, RecencyList, Record, RecordKey, Revision};
/// Pure list algebra.
pub use mutator::{Mutation, MutationOutcome, record_entry};
/// Sparse options and resolved policy.
pub use policy::{CompareFn, NamingStyle, RecentOptions, RecentPolicy};
/// Schema augmentation.
pub use schema::{AttachmentDeclaration, Augmentation, FieldDef, FieldType, RecordSchema};
/// Persistence collaborator traits.
pub use store::{AsyncRecordStore, RecordStore};
