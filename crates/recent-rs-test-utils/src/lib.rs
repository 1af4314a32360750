//! Test helpers shared across recent-rs crates.

pub mod store;

pub use store::{ConflictingStore, FailingStore, RecordingStore, StoreCall};
