//! Store statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for lock-free hot path updates
#[derive(Debug, Default)]
pub(crate) struct AtomicStoreStats {
    pub hits: AtomicU64,
    pub deferred_hits: AtomicU64,
    pub misses: AtomicU64,
    pub dispatched: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub retries: AtomicU64,
}

impl AtomicStoreStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            deferred_hits: self.deferred_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            ..StoreStats::default()
        }
    }
}

/// Statistics snapshot (returned to callers)
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct StoreStats {
    /// Lookups answered by a resolved record
    pub hits: u64,
    /// Lookups that joined a pending record
    pub deferred_hits: u64,
    /// Lookups that queued a new identifier
    pub misses: u64,
    /// Getter invocations, retries included
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Dispatch sets whose callers were rejected
    pub cancelled: u64,
    /// Re-dispatches after a failure
    pub retries: u64,
    /// Expired records removed by the store
    pub evictions: u64,
    /// Records currently held by the store
    pub records: usize,
    /// Batch keys with an active context
    pub contexts: usize,
}

impl StoreStats {
    /// Share of lookups served without a new dispatch
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.deferred_hits;
        let total = served + self.misses;

        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
