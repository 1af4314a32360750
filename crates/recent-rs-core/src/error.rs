//! Error types for recency attachments and their persistence collaborators.

use crate::model::{RecordKey, Revision};

/// Errors returned by record stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The stored revision no longer matches the expected one.
    #[error("revision conflict for {key} (expected={expected}, actual={actual})")]
    Conflict {
        key: RecordKey,
        expected: Revision,
        actual: Revision,
    },
    /// Key cannot be used by this backend.
    #[error("invalid record key: {0}")]
    InvalidKey(String),
    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors returned by attachment setup and recent-entry operations.
#[derive(Debug, thiserror::Error)]
pub enum RecentError {
    /// Invalid policy or attachment declaration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Parent record could not be found by key.
    #[error("record not found: {0}")]
    NotFound(RecordKey),
    /// Optimistic retries were exhausted.
    #[error("conflicting updates to {key} after {attempts} attempts")]
    Conflict { key: RecordKey, attempts: usize },
    /// Persistence failed; the store error is passed through untouched.
    #[error(transparent)]
    Persist(StoreError),
    /// The list field holds content that cannot be read as entries.
    #[error("cannot decode list field {field}: {message}")]
    Decode { field: String, message: String },
    /// Candidate value does not match the declared entry type.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// Blocking call on a serialized attachment from inside an async runtime.
    #[error("blocking call for {0} inside an async runtime; use the async entry point")]
    BlockingInRuntime(RecordKey),
    /// No operation is registered under this name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl RecentError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
