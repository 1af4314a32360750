//! Record and recency list model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Revision stamped by a store on every save. A record that was never saved
/// has revision 0.
pub type Revision = u64;

/// Opaque key identifying a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Wrap an existing key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for RecordKey {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// A parent record that a store can persist.
pub trait Record: Clone + Send + Sync + 'static {
    /// Key used by the store to locate the record.
    fn key(&self) -> &RecordKey;
    /// Revision the record was loaded or saved at.
    fn revision(&self) -> Revision;
    /// Stamp the revision assigned by the store.
    fn set_revision(&mut self, revision: Revision);
}

/// One timestamped item inside a recency list.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    /// Recorded value.
    pub value: V,
    /// Last time the value was recorded.
    pub timestamp: DateTime<Utc>,
}

impl<V> Entry<V> {
    pub fn new(value: V, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Bounded list of entries ordered newest first.
///
/// Persisted through a field accessor, which names the entry fields after the
/// attachment policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RecencyList<V> {
    entries: Vec<Entry<V>>,
}

impl<V> Default for RecencyList<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> RecencyList<V> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from stored entries, restoring newest-first order.
    pub fn from_entries(mut entries: Vec<Entry<V>>) -> Self {
        sort_newest_first(&mut entries);
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry<V>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<V>> {
        self.entries.iter()
    }

    /// Recorded values, newest first.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|entry| &entry.value)
    }

    /// Most recently recorded entry.
    pub fn newest(&self) -> Option<&Entry<V>> {
        self.entries.first()
    }

    pub fn into_entries(self) -> Vec<Entry<V>> {
        self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<Entry<V>> {
        &mut self.entries
    }
}

impl<'a, V> IntoIterator for &'a RecencyList<V> {
    type Item = &'a Entry<V>;
    type IntoIter = std::slice::Iter<'a, Entry<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Stable sort, descending by timestamp. Equal timestamps keep their order.
pub(crate) fn sort_newest_first<V>(entries: &mut [Entry<V>]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Schemaless record: a key, a revision and named JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Record key.
    pub key: RecordKey,
    /// Store revision.
    #[serde(default)]
    pub revision: Revision,
    /// Named fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create an empty, unsaved document.
    pub fn new(key: impl Into<RecordKey>) -> Self {
        Self {
            key: key.into(),
            revision: 0,
            fields: Map::new(),
        }
    }

    /// Set a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

impl Record for Document {
    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}
