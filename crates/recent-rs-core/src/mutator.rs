//! Pure recency list algebra: refresh or insert, re-sort, truncate.

use crate::model::{Entry, RecencyList, sort_newest_first};
use crate::policy::RecentPolicy;
use chrono::{DateTime, Duration, Utc};

/// What happened to the candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A new entry was appended.
    Inserted,
    /// The entry at `index` (pre-sort position) got a new timestamp.
    Refreshed { index: usize },
}

/// Result of one list mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<V> {
    /// Updated list, newest first, within capacity.
    pub list: RecencyList<V>,
    pub outcome: MutationOutcome,
    /// Entries dropped by truncation, newest first.
    pub evicted: Vec<Entry<V>>,
}

/// Record `candidate` at `now` into `list` under `policy`.
pub fn record_entry<V>(
    mut list: RecencyList<V>,
    candidate: V,
    policy: &RecentPolicy<V>,
    now: DateTime<Utc>,
) -> Mutation<V> {
    let entries = list.entries_mut();
    let existing = if policy.allow_duplicates() {
        None
    } else {
        entries
            .iter()
            .position(|entry| policy.matches(&candidate, &entry.value))
    };

    let outcome = match existing {
        Some(index) => {
            entries[index].timestamp = now;
            MutationOutcome::Refreshed { index }
        }
        None => {
            entries.push(Entry::new(candidate, now));
            MutationOutcome::Inserted
        }
    };

    sort_newest_first(entries);
    let capacity = policy.capacity().get();
    let evicted = if entries.len() > capacity {
        entries.split_off(capacity)
    } else {
        Vec::new()
    };

    Mutation {
        list,
        outcome,
        evicted,
    }
}

/// Timestamp for the next recording: `now`, or just after the newest entry when
/// the clock has not moved past it.
pub fn next_timestamp<V>(list: &RecencyList<V>, now: DateTime<Utc>) -> DateTime<Utc> {
    match list.iter().map(|entry| entry.timestamp).max() {
        Some(newest) if newest >= now => newest + Duration::nanoseconds(1),
        _ => now,
    }
}
