//! Batch coordinator
//!
//! [`BatchStore`] sits in front of a [`Getter`]. Lookups that share a batch
//! key accumulate in one context until the size threshold is reached or the
//! tick elapses, then go out as a single getter call. Identifiers already
//! pending join the outstanding dispatch, resolved identifiers are answered
//! from the record store, and failed dispatches are retried with backoff.

use super::context::{BatchContext, DispatchSet, TimerState, Waiter};
use super::events::{BatchEvent, BatchEventKind, EventSink};
use super::stats::{AtomicStoreStats, StoreStats};
use crate::config::Config;
use crate::core::deferred::{Deferred, Lookup, Outcome};
use crate::core::getter::{Getter, Records};
use crate::core::key::{BatchKey, RecordKey};
use crate::core::record_store::{Admission, MemoryRecordStore, Record, RecordStore};
use crate::utils::error::{BackoffStep, FetchError, Result};
use dashmap::DashMap;
use futures::future::try_join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

type MemoryStore<G> =
    MemoryRecordStore<<G as Getter>::Id, <G as Getter>::Value, <G as Getter>::Error>;

/// Batching, deduplicating and caching front for a bulk getter.
///
/// Cloning is cheap and every clone drives the same contexts and records.
/// Admissions spawn timers and dispatches on the ambient tokio runtime, so
/// [`BatchStore::add`] must be called from within one.
pub struct BatchStore<G: Getter, S = MemoryStore<G>> {
    inner: Arc<Inner<G, S>>,
}

impl<G: Getter, S> Clone for BatchStore<G, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<G: Getter, S> {
    config: Config,
    getter: G,
    records: S,
    contexts: DashMap<BatchKey, BatchContext<G>>,
    events: EventSink<G::Id, G::Params>,
    stats: AtomicStoreStats,
    closed: AtomicBool,
}

impl<G: Getter> BatchStore<G> {
    /// Create a store backed by an in-memory record store
    pub fn new(config: Config, getter: G) -> Result<Self> {
        Self::with_store(config, getter, MemoryRecordStore::new())
    }
}

impl<G, S> BatchStore<G, S>
where
    G: Getter,
    S: RecordStore<G::Id, G::Value, G::Error>,
{
    /// Create a store over a custom record store
    pub fn with_store(config: Config, getter: G, records: S) -> Result<Self> {
        config.validate()?;

        info!(
            unique_options = ?config.unique_options,
            batch_limit = config.batch.limit,
            batch_enabled = config.batch.enabled,
            "Batch store initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                getter,
                records,
                contexts: DashMap::new(),
                events: EventSink::new(),
                stats: AtomicStoreStats::default(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn getter(&self) -> &G {
        &self.inner.getter
    }

    pub fn records(&self) -> &S {
        &self.inner.records
    }

    /// Admit one lookup.
    ///
    /// A resolved record answers immediately; a pending record is joined;
    /// otherwise the identifier is queued in its batch context. The returned
    /// future settles when the owning dispatch does.
    pub fn add(&self, id: G::Id, params: G::Params) -> Lookup<G::Value, G::Error> {
        self.inner.add(id, params)
    }

    /// Admit one lookup and wait for its outcome
    pub async fn get(&self, id: G::Id, params: G::Params) -> Outcome<G::Value, G::Error> {
        self.add(id, params).await
    }

    /// Look up several identifiers with the same parameters.
    ///
    /// All identifiers are admitted before any is awaited, so misses share
    /// dispatches. Values come back in request order; the first rejection
    /// fails the whole call.
    pub async fn get_many<I>(
        &self,
        ids: I,
        params: G::Params,
    ) -> std::result::Result<Vec<Option<G::Value>>, FetchError<G::Error>>
    where
        I: IntoIterator<Item = G::Id>,
    {
        let lookups: Vec<_> = ids
            .into_iter()
            .map(|id| self.add(id, params.clone()))
            .collect();
        try_join_all(lookups).await
    }

    /// Call the getter directly, bypassing records and batching
    pub async fn skip(
        &self,
        ids: &[G::Id],
        params: &G::Params,
    ) -> std::result::Result<Records<G::Id, G::Value>, G::Error> {
        debug!(ids = ?ids, "Bypassing batch store");
        let response = self.inner.getter.fetch(ids, params).await?;
        self.inner.getter.parse_response(response, ids, params)
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent<G::Id, G::Params>> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = self.inner.stats.snapshot();
        stats.evictions = self.inner.records.evictions();
        stats.records = self.inner.records.len();
        stats.contexts = self.inner.contexts.len();
        stats
    }

    /// Batch keys with queued, scheduled or running work
    pub fn active_contexts(&self) -> usize {
        self.inner.contexts.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop accepting lookups.
    ///
    /// Timers and scheduled retries are aborted and records cleared; callers
    /// waiting on them observe [`FetchError::Closed`]. Getter calls already
    /// running still settle their callers.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl<G, S> Inner<G, S>
where
    G: Getter,
    S: RecordStore<G::Id, G::Value, G::Error>,
{
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn add(self: &Arc<Self>, id: G::Id, params: G::Params) -> Lookup<G::Value, G::Error> {
        if self.is_closed() {
            let (deferred, handle) = Deferred::new();
            drop(deferred);
            return Lookup::deferred(handle);
        }

        let key = BatchKey::derive(&self.config.unique_options, &params);
        let record_key = RecordKey::new(key.clone(), id.clone());

        match self.records.admit(&record_key) {
            Admission::Hit(value) => {
                AtomicStoreStats::incr(&self.stats.hits);
                self.events.emit(BatchEvent::new(
                    BatchEventKind::CacheHit { deferred: false },
                    key,
                    vec![id],
                    params,
                ));
                Lookup::ready(value)
            }
            Admission::Joined(handle) => {
                AtomicStoreStats::incr(&self.stats.deferred_hits);
                self.events.emit(BatchEvent::new(
                    BatchEventKind::CacheHit { deferred: true },
                    key,
                    vec![id],
                    params,
                ));
                Lookup::deferred(handle)
            }
            Admission::Inserted(deferred, handle) => {
                AtomicStoreStats::incr(&self.stats.misses);
                self.events.emit(BatchEvent::new(
                    BatchEventKind::CacheMiss,
                    key.clone(),
                    vec![id.clone()],
                    params.clone(),
                ));
                self.enqueue(key, Waiter { id, deferred }, params);
                Lookup::deferred(handle)
            }
        }
    }

    /// Queue a fresh identifier, flushing when the context is full
    fn enqueue(self: &Arc<Self>, key: BatchKey, waiter: Waiter<G>, params: G::Params) {
        // Without batching every identifier is its own dispatch
        let limit = if self.config.batch.enabled {
            self.config.batch.limit
        } else {
            1
        };

        let ready = {
            let mut ctx = self
                .contexts
                .entry(key.clone())
                .or_insert_with(|| BatchContext::new(params, self.config.retry.clone()));
            ctx.pending.push_back(waiter);

            if ctx.pending.len() >= limit {
                ctx.timer.cancel();
                let set = ctx.take_batch(&key, limit);
                if !ctx.pending.is_empty() {
                    self.arm_timer(&key, &mut ctx);
                }
                set
            } else {
                if !ctx.timer.is_armed() {
                    self.arm_timer(&key, &mut ctx);
                }
                None
            }
        };

        if let Some(set) = ready {
            self.dispatch(set);
        }
    }

    fn arm_timer(self: &Arc<Self>, key: &BatchKey, ctx: &mut BatchContext<G>) {
        let epoch = ctx.next_seq();
        let tick = self.config.batch.tick();
        let weak = Arc::downgrade(self);
        let key = key.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(tick).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_tick(&key, epoch);
            }
        });
        ctx.timer = TimerState::Armed { epoch, handle };
    }

    fn on_tick(self: &Arc<Self>, key: &BatchKey, epoch: u64) {
        let ready = {
            let Some(mut ctx) = self.contexts.get_mut(key) else {
                return;
            };
            if !ctx.timer.is_current(epoch) {
                return;
            }
            // This task is the timer, nothing left to abort
            ctx.timer = TimerState::Idle;
            let set = ctx.take_batch(key, self.config.batch.limit);
            // Leftovers wait for the next tick
            if !ctx.pending.is_empty() {
                self.arm_timer(key, &mut ctx);
            }
            set
        };

        match ready {
            Some(set) => self.dispatch(set),
            None => self.release(key),
        }
    }

    /// Hand a dispatch set to the getter on its own task
    fn dispatch(self: &Arc<Self>, set: DispatchSet<G>) {
        AtomicStoreStats::incr(&self.stats.dispatched);
        self.emit_for(&set, BatchEventKind::Batch);

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.execute(set).await });
    }

    async fn execute(self: Arc<Self>, set: DispatchSet<G>) {
        let ids = set.ids();
        let result = match self.getter.fetch(&ids, &set.params).await {
            Ok(response) => self.getter.parse_response(response, &ids, &set.params),
            Err(error) => Err(error),
        };

        match result {
            Ok(records) => self.complete(set, records),
            Err(error) => self.fail(set, error),
        }
    }

    fn complete(
        self: &Arc<Self>,
        mut set: DispatchSet<G>,
        mut records: Records<G::Id, G::Value>,
    ) {
        AtomicStoreStats::incr(&self.stats.succeeded);
        self.emit_for(&set, BatchEventKind::BatchSuccess);
        set.backoff.on_success();

        if let Some(mut ctx) = self.contexts.get_mut(&set.key) {
            ctx.in_flight = ctx.in_flight.saturating_sub(1);
        }

        let cache = &self.config.cache;
        let caching = cache.enabled && !self.is_closed();
        let DispatchSet { key, waiters, .. } = set;

        for Waiter { id, deferred } in waiters {
            let value = records.remove(&id);
            let record_key = RecordKey::new(key.clone(), id);
            if caching {
                self.records
                    .set(record_key, Record::Resolved(value.clone()), Some(cache.ttl()));
            } else {
                self.records.remove(&record_key);
            }
            deferred.resolve(value);
        }

        self.release(&key);
    }

    fn fail(self: &Arc<Self>, mut set: DispatchSet<G>, error: G::Error) {
        AtomicStoreStats::incr(&self.stats.failed);

        let step = set.backoff.on_failure();
        let guard = self.contexts.get_mut(&set.key).map(|mut ctx| {
            ctx.in_flight = ctx.in_flight.saturating_sub(1);
            ctx
        });

        self.emit_for(
            &set,
            BatchEventKind::BatchFailed {
                error: error.to_string(),
                attempt: step.attempts(),
            },
        );

        match (step, guard) {
            (BackoffStep::Retry { delay, .. }, Some(mut ctx)) if !self.is_closed() => {
                self.schedule_retry(&mut ctx, set, delay);
            }
            (_, guard) => {
                drop(guard);
                self.cancel(set, error);
            }
        }
    }

    /// Re-dispatch exactly `set` after `delay`
    fn schedule_retry(
        self: &Arc<Self>,
        ctx: &mut BatchContext<G>,
        set: DispatchSet<G>,
        delay: Duration,
    ) {
        let seq = ctx.next_seq();
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.redispatch(seq, set);
            }
        });
        ctx.retries.insert(seq, handle);
    }

    fn redispatch(self: &Arc<Self>, seq: u64, set: DispatchSet<G>) {
        let scheduled = match self.contexts.get_mut(&set.key) {
            Some(mut ctx) => {
                let scheduled = ctx.retries.remove(&seq).is_some();
                if scheduled {
                    ctx.in_flight += 1;
                }
                scheduled
            }
            None => false,
        };

        // A context torn down meanwhile drops the set, closing its callers
        if scheduled {
            AtomicStoreStats::incr(&self.stats.retries);
            self.dispatch(set);
        }
    }

    /// Reject every caller of `set` and forget their pending records
    fn cancel(self: &Arc<Self>, set: DispatchSet<G>, error: G::Error) {
        AtomicStoreStats::incr(&self.stats.cancelled);
        self.emit_for(
            &set,
            BatchEventKind::BatchCancelled {
                error: error.to_string(),
            },
        );

        let DispatchSet { key, waiters, .. } = set;
        for Waiter { id, deferred } in waiters {
            self.records.remove(&RecordKey::new(key.clone(), id));
            deferred.reject(error.clone());
        }

        self.release(&key);
    }

    /// Drop the context for `key` once nothing refers to it
    fn release(&self, key: &BatchKey) {
        if self
            .contexts
            .remove_if(key, |_, ctx| ctx.is_idle())
            .is_some()
        {
            debug!(key = %key, "Batch context released");
        }
    }

    fn emit_for(&self, set: &DispatchSet<G>, kind: BatchEventKind) {
        self.events.emit(
            BatchEvent::new(kind, set.key.clone(), set.ids(), set.params.clone())
                .with_batch_id(set.batch_id),
        );
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut dropped = 0usize;
        self.contexts.retain(|_, ctx| {
            ctx.abort_tasks();
            dropped += ctx.pending.len();
            false
        });
        self.records.clear();

        info!("Batch store shut down, {} queued lookups closed", dropped);
    }
}

impl<G: Getter, S> Drop for Inner<G, S> {
    fn drop(&mut self) {
        for mut ctx in self.contexts.iter_mut() {
            ctx.abort_tasks();
        }
    }
}
