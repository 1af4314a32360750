//! Attachment: one recency list bound to a record type.
//!
//! Every entry point runs the same cycle: load the list through the accessor,
//! apply the pure mutation, write the list back and save the parent record.
//! Conflicting saves are retried according to the policy's concurrency guard.

use crate::accessor::ListFieldAccessor;
use crate::clock::{Clock, SystemClock};
use crate::error::{RecentError, StoreError};
use crate::guard::KeyedLocks;
use crate::model::{RecencyList, Record, RecordKey};
use crate::mutator::{MutationOutcome, next_timestamp, record_entry};
use crate::policy::RecentPolicy;
use crate::store::{AsyncRecordStore, RecordStore};
use log::debug;
use std::sync::Arc;

/// A configured recency list on records of type `R` holding values of type `V`.
pub struct Attachment<R, V> {
    policy: Arc<RecentPolicy<V>>,
    accessor: Arc<dyn ListFieldAccessor<R, V>>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
}

impl<R, V> Clone for Attachment<R, V> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            accessor: self.accessor.clone(),
            clock: self.clock.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<R, V> Attachment<R, V>
where
    R: Record,
    V: Clone + Send + Sync + 'static,
{
    /// Bind a resolved policy to the field the accessor points at.
    pub fn new(policy: RecentPolicy<V>, accessor: impl ListFieldAccessor<R, V> + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
            accessor: Arc::new(accessor),
            clock: Arc::new(SystemClock),
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RecentPolicy<V> {
        &self.policy
    }

    /// Read the current list from a record.
    pub fn list(&self, record: &R) -> Result<RecencyList<V>, RecentError> {
        self.accessor.get(record)
    }

    /// Record `value` on the in-memory record without persisting it.
    pub fn apply(&self, record: &mut R, value: V) -> Result<MutationOutcome, RecentError> {
        let list = self.accessor.get(record)?;
        let now = next_timestamp(&list, self.clock.now());
        let mutation = record_entry(list, value, &self.policy, now);
        debug!(
            "recorded {} entry (key={}, outcome={:?}, len={}, evicted={})",
            self.policy.label(),
            record.key(),
            mutation.outcome,
            mutation.list.len(),
            mutation.evicted.len()
        );
        self.accessor.set(record, mutation.list)?;
        Ok(mutation.outcome)
    }

    /// Record `value` on a live record and save it. Blocks on the store.
    ///
    /// With the serialized guard this waits on the same per-key lock as the
    /// async entry points and fails with [`RecentError::BlockingInRuntime`]
    /// when called from inside an async runtime.
    pub fn record_recent<S>(&self, store: &S, record: R, value: V) -> Result<R, RecentError>
    where
        S: RecordStore<R> + ?Sized,
    {
        let key = record.key().clone();
        self.guarded(&key, || self.cycle_blocking(store, &key, Some(record), value))
    }

    /// Fetch the record by key, record `value` and save it. Blocks on the store.
    pub fn record_recent_by_key<S>(
        &self,
        store: &S,
        key: &RecordKey,
        value: V,
    ) -> Result<R, RecentError>
    where
        S: RecordStore<R> + ?Sized,
    {
        self.guarded(key, || self.cycle_blocking(store, key, None, value))
    }

    /// Async counterpart of [`Attachment::record_recent`].
    pub async fn record_recent_async<S>(
        &self,
        store: &S,
        record: R,
        value: V,
    ) -> Result<R, RecentError>
    where
        S: AsyncRecordStore<R> + ?Sized,
    {
        let key = record.key().clone();
        let cycle = self.cycle_async(store, &key, Some(record), value);
        if self.policy.guard().serializes() {
            self.locks.run_async(&key, cycle).await
        } else {
            cycle.await
        }
    }

    /// Async counterpart of [`Attachment::record_recent_by_key`].
    pub async fn record_recent_by_key_async<S>(
        &self,
        store: &S,
        key: &RecordKey,
        value: V,
    ) -> Result<R, RecentError>
    where
        S: AsyncRecordStore<R> + ?Sized,
    {
        let cycle = self.cycle_async(store, key, None, value);
        if self.policy.guard().serializes() {
            self.locks.run_async(key, cycle).await
        } else {
            cycle.await
        }
    }

    fn guarded<T>(
        &self,
        key: &RecordKey,
        op: impl FnOnce() -> Result<T, RecentError>,
    ) -> Result<T, RecentError> {
        if self.policy.guard().serializes() {
            self.locks.run_blocking(key, op)
        } else {
            op()
        }
    }

    fn cycle_blocking<S>(
        &self,
        store: &S,
        key: &RecordKey,
        initial: Option<R>,
        value: V,
    ) -> Result<R, RecentError>
    where
        S: RecordStore<R> + ?Sized,
    {
        let mut current = match initial {
            Some(record) => record,
            None => found(key, store.find_by_key(key))?,
        };
        let mut attempt = 1;
        loop {
            let expected = self.policy.guard().expected_revision(current.revision());
            let mut next = current;
            self.apply(&mut next, value.clone())?;
            match store.save(next, expected) {
                Ok(saved) => return Ok(saved),
                Err(err) => self.retry_or_fail(err, key, attempt)?,
            }
            current = found(key, store.find_by_key(key))?;
            attempt += 1;
        }
    }

    async fn cycle_async<S>(
        &self,
        store: &S,
        key: &RecordKey,
        initial: Option<R>,
        value: V,
    ) -> Result<R, RecentError>
    where
        S: AsyncRecordStore<R> + ?Sized,
    {
        let mut current = match initial {
            Some(record) => record,
            None => found(key, store.find_by_key(key).await)?,
        };
        let mut attempt = 1;
        loop {
            let expected = self.policy.guard().expected_revision(current.revision());
            let mut next = current;
            self.apply(&mut next, value.clone())?;
            match store.save(next, expected).await {
                Ok(saved) => return Ok(saved),
                Err(err) => self.retry_or_fail(err, key, attempt)?,
            }
            current = found(key, store.find_by_key(key).await)?;
            attempt += 1;
        }
    }

    /// Ok when another round is allowed after a failed save.
    fn retry_or_fail(
        &self,
        err: StoreError,
        key: &RecordKey,
        attempt: usize,
    ) -> Result<(), RecentError> {
        match err {
            StoreError::Conflict { .. } if attempt <= self.policy.guard().retries() => {
                debug!(
                    "revision conflict on {}, reloading (key={key}, attempt={attempt})",
                    self.policy.label()
                );
                Ok(())
            }
            StoreError::Conflict { .. } => Err(RecentError::Conflict {
                key: key.clone(),
                attempts: attempt,
            }),
            err => Err(RecentError::Persist(err)),
        }
    }
}

fn found<R>(key: &RecordKey, lookup: Result<Option<R>, StoreError>) -> Result<R, RecentError> {
    lookup
        .map_err(RecentError::Persist)?
        .ok_or_else(|| RecentError::NotFound(key.clone()))
}
