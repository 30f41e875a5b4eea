//! Record store type definitions
//!
//! This module contains the record states, the cache entry metadata wrapped
//! around them, and the store contract the coordinator relies on.

use crate::core::deferred::{Deferred, DeferredHandle};
use crate::core::key::RecordKey;
use std::time::Duration;
use tokio::time::Instant;

/// State of one (batch key, identifier) pair
#[derive(Debug, Clone)]
pub enum Record<V, E> {
    /// Dispatch outstanding; callers join this handle
    Pending(DeferredHandle<V, E>),
    /// Settled value, possibly absent
    Resolved(Option<V>),
}

impl<V, E> Record<V, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Result of an atomic get-or-create on the store
#[derive(Debug)]
pub enum Admission<V, E> {
    /// A live resolved record answered the lookup
    Hit(Option<V>),
    /// A pending record exists; join its handle
    Joined(DeferredHandle<V, E>),
    /// No live record existed; a pending one was created and the caller owns
    /// its settle side
    Inserted(Deferred<V, E>, DeferredHandle<V, E>),
}

/// Stored value with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,
    /// When the entry expires; `None` never expires
    pub expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry
    pub fn new(value: T, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Check if the entry is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Store contract consumed by the coordinator.
///
/// Implementations must make [`RecordStore::admit`] atomic per key: two
/// concurrent admissions of the same key never both get `Inserted`.
/// Expired resolved records behave as absent everywhere.
pub trait RecordStore<Id, V, E>: Send + Sync + 'static {
    /// Live record for `key`
    fn get(&self, key: &RecordKey<Id>) -> Option<Record<V, E>>;

    /// Store `record`, replacing any previous one; `ttl = None` never expires
    fn set(&self, key: RecordKey<Id>, record: Record<V, E>, ttl: Option<Duration>);

    /// Remove and return the live record for `key`
    fn remove(&self, key: &RecordKey<Id>) -> Option<Record<V, E>>;

    /// Atomic get-or-create of a pending record
    fn admit(&self, key: &RecordKey<Id>) -> Admission<V, E>;

    /// Drop every expired record, returning how many were removed
    fn purge_expired(&self) -> usize;

    /// Number of stored records, expired ones included until purged
    fn len(&self) -> usize;

    /// Expired records removed so far, for stores that track it
    fn evictions(&self) -> u64 {
        0
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record
    fn clear(&self);
}
