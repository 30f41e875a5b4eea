//! In-memory record store
//!
//! Records live in a sharded `DashMap`, so lookups for unrelated keys do not
//! contend on one lock. Expired entries are removed lazily on access and by a
//! periodic sweep.

use super::types::{Admission, CacheEntry, Record, RecordStore};
use crate::core::deferred::Deferred;
use crate::core::key::{BatchId, RecordKey};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Inserts between two sweeps of expired entries
const PURGE_INTERVAL: u64 = 1000;

/// TTL-aware in-memory record store
pub struct MemoryRecordStore<Id, V, E> {
    records: DashMap<RecordKey<Id>, CacheEntry<Record<V, E>>>,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl<Id, V, E> MemoryRecordStore<Id, V, E>
where
    Id: BatchId,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            inserts: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn record_insert(&self) {
        let inserts = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserts.is_multiple_of(PURGE_INTERVAL) {
            self.purge_expired();
        }
    }
}

impl<Id, V, E> Default for MemoryRecordStore<Id, V, E>
where
    Id: BatchId,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, V, E> RecordStore<Id, V, E> for MemoryRecordStore<Id, V, E>
where
    Id: BatchId,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &RecordKey<Id>) -> Option<Record<V, E>> {
        let expired = match self.records.get(key) {
            Some(entry) => {
                if !entry.is_expired() {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if expired && self.records.remove_if(key, |_, entry| entry.is_expired()).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted expired record: {}", key);
        }
        None
    }

    fn set(&self, key: RecordKey<Id>, record: Record<V, E>, ttl: Option<Duration>) {
        self.records.insert(key, CacheEntry::new(record, ttl));
        self.record_insert();
    }

    fn remove(&self, key: &RecordKey<Id>) -> Option<Record<V, E>> {
        let (_, entry) = self.records.remove(key)?;
        if entry.is_expired() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(entry.value)
    }

    fn admit(&self, key: &RecordKey<Id>) -> Admission<V, E> {
        let admission = match self.records.entry(key.clone()) {
            Entry::Occupied(occupied) if !occupied.get().is_expired() => {
                match &occupied.get().value {
                    Record::Resolved(value) => Admission::Hit(value.clone()),
                    Record::Pending(handle) => Admission::Joined(handle.clone()),
                }
            }
            Entry::Occupied(mut occupied) => {
                let (deferred, handle) = Deferred::new();
                occupied.insert(CacheEntry::new(Record::Pending(handle.clone()), None));
                self.evictions.fetch_add(1, Ordering::Relaxed);
                Admission::Inserted(deferred, handle)
            }
            Entry::Vacant(vacant) => {
                let (deferred, handle) = Deferred::new();
                vacant.insert(CacheEntry::new(Record::Pending(handle.clone()), None));
                Admission::Inserted(deferred, handle)
            }
        };

        if matches!(admission, Admission::Inserted(..)) {
            self.record_insert();
        }
        admission
    }

    fn purge_expired(&self) -> usize {
        let mut removed_count = 0usize;

        self.records.retain(|_, entry| {
            if entry.is_expired() {
                removed_count += 1;
                false
            } else {
                true
            }
        });

        if removed_count > 0 {
            self.evictions
                .fetch_add(removed_count as u64, Ordering::Relaxed);
            info!("Cleaned up {} expired records", removed_count);
        }
        removed_count
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.records.clear();
        info!("Record store cleared");
    }
}
