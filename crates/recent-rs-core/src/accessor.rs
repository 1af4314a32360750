//! Field accessors binding a recency list to its place on a parent record.

use crate::error::RecentError;
use crate::model::{Document, Entry, RecencyList};
use crate::policy::RecentPolicy;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// Reads and replaces one recency list on a record of type `R`.
pub trait ListFieldAccessor<R, V>: Send + Sync {
    /// Current list stored on the record.
    fn get(&self, record: &R) -> Result<RecencyList<V>, RecentError>;
    /// Replace the list stored on the record.
    fn set(&self, record: &mut R, list: RecencyList<V>) -> Result<(), RecentError>;
}

/// Persisted form of a recency list on a typed record: entry objects keyed by
/// the policy's entry and timestamp field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredList(Vec<Value>);

impl StoredList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw entry objects, newest first.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

/// Converts between typed entries and `{ <entry>: value, <timestamp>: rfc3339 }`
/// objects.
#[derive(Debug, Clone)]
struct EntryCodec {
    list_field: String,
    entry_field: String,
    timestamp_field: String,
}

impl EntryCodec {
    fn from_policy<V>(policy: &RecentPolicy<V>) -> Self {
        Self {
            list_field: policy.list_field().to_string(),
            entry_field: policy.entry_field().to_string(),
            timestamp_field: policy.timestamp_field().to_string(),
        }
    }

    fn decode_error(&self, message: impl Into<String>) -> RecentError {
        RecentError::Decode {
            field: self.list_field.clone(),
            message: message.into(),
        }
    }

    fn decode<V: DeserializeOwned>(&self, items: &[Value]) -> Result<RecencyList<V>, RecentError> {
        let entries = items
            .iter()
            .enumerate()
            .map(|(idx, item)| self.decode_entry(idx, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecencyList::from_entries(entries))
    }

    fn decode_entry<V: DeserializeOwned>(
        &self,
        idx: usize,
        item: &Value,
    ) -> Result<Entry<V>, RecentError> {
        let Value::Object(object) = item else {
            return Err(self.decode_error(format!("entry {idx} is not an object")));
        };
        let value = object
            .get(&self.entry_field)
            .cloned()
            .ok_or_else(|| self.decode_error(format!("entry {idx} has no {}", self.entry_field)))?;
        let value: V = serde_json::from_value(value)
            .map_err(|err| self.decode_error(format!("entry {idx}: {err}")))?;
        let timestamp = object
            .get(&self.timestamp_field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                self.decode_error(format!("entry {idx} has no {}", self.timestamp_field))
            })?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|err| self.decode_error(format!("entry {idx}: {err}")))?
            .with_timezone(&Utc);
        Ok(Entry::new(value, timestamp))
    }

    fn encode<V: Serialize>(&self, list: RecencyList<V>) -> Result<Vec<Value>, RecentError> {
        let mut items = Vec::with_capacity(list.len());
        for entry in list.into_entries() {
            let value = serde_json::to_value(entry.value)
                .map_err(|err| self.decode_error(err.to_string()))?;
            let mut object = Map::new();
            object.insert(self.entry_field.clone(), value);
            object.insert(
                self.timestamp_field.clone(),
                Value::String(entry.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
            items.push(Value::Object(object));
        }
        Ok(items)
    }
}

/// Accessor for a [`StoredList`] field of a Rust struct.
pub struct StructFieldAccessor<R, V> {
    codec: EntryCodec,
    get: fn(&R) -> &StoredList,
    get_mut: fn(&mut R) -> &mut StoredList,
    _value: PhantomData<fn() -> V>,
}

impl<R, V> StructFieldAccessor<R, V> {
    /// Bind the struct field to the entry and timestamp names of `policy`.
    pub fn from_policy(
        policy: &RecentPolicy<V>,
        get: fn(&R) -> &StoredList,
        get_mut: fn(&mut R) -> &mut StoredList,
    ) -> Self {
        Self {
            codec: EntryCodec::from_policy(policy),
            get,
            get_mut,
            _value: PhantomData,
        }
    }
}

impl<R, V> ListFieldAccessor<R, V> for StructFieldAccessor<R, V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(&self, record: &R) -> Result<RecencyList<V>, RecentError> {
        self.codec.decode((self.get)(record).as_slice())
    }

    fn set(&self, record: &mut R, list: RecencyList<V>) -> Result<(), RecentError> {
        (self.get_mut)(record).0 = self.codec.encode(list)?;
        Ok(())
    }
}

/// Accessor for a list stored as a JSON array on a [`Document`].
///
/// Each entry is an object with the policy's entry field holding the value and
/// its timestamp field holding an RFC 3339 string. A missing or null field reads
/// as an empty list.
#[derive(Debug, Clone)]
pub struct JsonListAccessor<V> {
    codec: EntryCodec,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonListAccessor<V> {
    /// Build the accessor from the field names of a resolved policy.
    pub fn from_policy(policy: &RecentPolicy<V>) -> Self {
        Self {
            codec: EntryCodec::from_policy(policy),
            _value: PhantomData,
        }
    }
}

impl<V> ListFieldAccessor<Document, V> for JsonListAccessor<V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(&self, record: &Document) -> Result<RecencyList<V>, RecentError> {
        match record.get(&self.codec.list_field) {
            None | Some(Value::Null) => Ok(RecencyList::new()),
            Some(Value::Array(items)) => self.codec.decode(items),
            Some(_) => Err(self.codec.decode_error("expected an array")),
        }
    }

    fn set(&self, record: &mut Document, list: RecencyList<V>) -> Result<(), RecentError> {
        let items = self.codec.encode(list)?;
        record.set(self.codec.list_field.clone(), Value::Array(items));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonListAccessor, ListFieldAccessor, StoredList, StructFieldAccessor};
    use crate::error::RecentError;
    use crate::model::{Document, Entry, RecencyList};
    use crate::policy::{RecentOptions, RecentPolicy};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Profile {
        recent_views: StoredList,
        recent_plays: StoredList,
    }

    #[test]
    fn struct_accessors_address_separate_fields() {
        let views_policy = RecentPolicy::<u32>::resolve(&RecentOptions::default()).expect("views");
        let plays_policy = RecentPolicy::<u32>::resolve(&RecentOptions::new().name("play"))
            .expect("plays");
        let views = StructFieldAccessor::from_policy(
            &views_policy,
            |profile: &Profile| &profile.recent_views,
            |profile: &mut Profile| &mut profile.recent_views,
        );
        let plays = StructFieldAccessor::from_policy(
            &plays_policy,
            |profile: &Profile| &profile.recent_plays,
            |profile: &mut Profile| &mut profile.recent_plays,
        );
        let mut profile = Profile::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        views
            .set(&mut profile, RecencyList::from_entries(vec![Entry::new(1, now)]))
            .expect("set views");
        assert_eq!(views.get(&profile).expect("views").len(), 1);
        assert!(plays.get(&profile).expect("plays").is_empty());
        assert!(profile.recent_plays.is_empty());
    }

    #[test]
    fn struct_accessor_stores_policy_field_names() {
        let options = RecentOptions::new().name("hairball").timestamp_field("time");
        let policy = RecentPolicy::<String>::resolve(&options).expect("policy");
        let accessor = StructFieldAccessor::from_policy(
            &policy,
            |profile: &Profile| &profile.recent_views,
            |profile: &mut Profile| &mut profile.recent_views,
        );
        let stamp = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let mut profile = Profile::default();
        accessor
            .set(
                &mut profile,
                RecencyList::from_entries(vec![Entry::new("evening".to_string(), stamp)]),
            )
            .expect("set");
        assert_eq!(
            profile.recent_views.as_slice(),
            &[json!({ "hairball": "evening", "time": "2024-02-03T04:05:06Z" })]
        );
        assert_eq!(
            serde_json::to_value(&profile.recent_views).expect("serialize"),
            json!([{ "hairball": "evening", "time": "2024-02-03T04:05:06Z" }])
        );
        let list: RecencyList<String> = accessor.get(&profile).expect("get");
        assert_eq!(list.entries(), &[Entry::new("evening".to_string(), stamp)]);
    }

    #[test]
    fn json_accessor_uses_policy_field_names() {
        let options = RecentOptions::new().name("play").timestamp_field("time");
        let policy = RecentPolicy::<String>::resolve(&options).expect("policy");
        let accessor = JsonListAccessor::from_policy(&policy);
        let stamp = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap() + Duration::nanoseconds(7);

        let mut doc = Document::new("doc");
        accessor
            .set(
                &mut doc,
                RecencyList::from_entries(vec![Entry::new("song".to_string(), stamp)]),
            )
            .expect("set");
        assert_eq!(
            doc.get("recentPlays"),
            Some(&json!([{ "play": "song", "time": "2024-02-03T04:05:06.000000007Z" }]))
        );

        let list = accessor.get(&doc).expect("get");
        assert_eq!(list.entries(), &[Entry::new("song".to_string(), stamp)]);
    }

    #[test]
    fn json_accessor_reads_missing_field_as_empty() {
        let policy = RecentPolicy::<String>::resolve(&RecentOptions::default()).expect("policy");
        let accessor = JsonListAccessor::from_policy(&policy);
        let doc = Document::new("doc").with_field("recentViews", json!(null));
        assert!(accessor.get(&doc).expect("get").is_empty());
        assert!(accessor.get(&Document::new("other")).expect("get").is_empty());
    }

    #[test]
    fn json_accessor_rejects_malformed_content() {
        let policy = RecentPolicy::<String>::resolve(&RecentOptions::default()).expect("policy");
        let accessor = JsonListAccessor::from_policy(&policy);

        let doc = Document::new("doc").with_field("recentViews", json!("nope"));
        assert!(matches!(accessor.get(&doc), Err(RecentError::Decode { .. })));

        let doc = Document::new("doc").with_field("recentViews", json!([{ "view": "a" }]));
        let err = accessor.get(&doc).expect_err("missing timestamp");
        assert!(err.to_string().contains("has no date"));
    }
}
