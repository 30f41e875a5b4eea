//! Batch context table entries
//!
//! One [`BatchContext`] exists per active batch key. It accumulates pending
//! identifiers in arrival order and owns the flush timer and scheduled
//! retries. Backoff state travels with each [`DispatchSet`], so two sets of
//! the same key retry independently.

use crate::config::RetryConfig;
use crate::core::deferred::Deferred;
use crate::core::getter::Getter;
use crate::core::key::BatchKey;
use crate::utils::error::Backoff;
use std::collections::{HashMap, VecDeque};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Flush timer of a context
#[derive(Debug, Default)]
pub(crate) enum TimerState {
    /// No flush scheduled
    #[default]
    Idle,
    /// A flush fires after the tick unless superseded; stale firings compare
    /// `epoch` and do nothing
    Armed { epoch: u64, handle: JoinHandle<()> },
}

impl TimerState {
    pub(crate) fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    /// Whether the armed timer is the one identified by `epoch`
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        matches!(self, Self::Armed { epoch: armed, .. } if *armed == epoch)
    }

    /// Abort any armed flush and return to idle
    pub(crate) fn cancel(&mut self) {
        if let Self::Armed { handle, .. } = std::mem::take(self) {
            handle.abort();
        }
    }
}

/// An identifier waiting for dispatch, with the settle side of its record
pub(crate) struct Waiter<G: Getter> {
    pub id: G::Id,
    pub deferred: Deferred<G::Value, G::Error>,
}

/// Identifiers sent together in one getter call
pub(crate) struct DispatchSet<G: Getter> {
    pub batch_id: Uuid,
    pub key: BatchKey,
    pub params: G::Params,
    pub waiters: Vec<Waiter<G>>,
    /// Retry episode of exactly these identifiers
    pub backoff: Backoff,
}

impl<G: Getter> DispatchSet<G> {
    pub(crate) fn new(
        key: BatchKey,
        params: G::Params,
        waiters: Vec<Waiter<G>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            key,
            params,
            waiters,
            backoff: Backoff::new(retry),
        }
    }

    pub(crate) fn ids(&self) -> Vec<G::Id> {
        self.waiters.iter().map(|w| w.id.clone()).collect()
    }
}

/// Accumulation state for one batch key
pub(crate) struct BatchContext<G: Getter> {
    /// Shared parameters, fixed by the first admission
    pub params: G::Params,
    /// Identifiers not yet dispatched, oldest first
    pub pending: VecDeque<Waiter<G>>,
    retry: RetryConfig,
    pub timer: TimerState,
    /// Scheduled re-dispatches keyed by sequence number
    pub retries: HashMap<u64, JoinHandle<()>>,
    /// Getter calls currently running for this key
    pub in_flight: usize,
    next_seq: u64,
}

impl<G: Getter> BatchContext<G> {
    pub(crate) fn new(params: G::Params, retry: RetryConfig) -> Self {
        Self {
            params,
            pending: VecDeque::new(),
            retry,
            timer: TimerState::Idle,
            retries: HashMap::new(),
            in_flight: 0,
            next_seq: 0,
        }
    }

    /// Fresh sequence number for a timer epoch or a scheduled retry
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Remove up to `limit` identifiers from the front as one dispatch set
    pub(crate) fn take_batch(&mut self, key: &BatchKey, limit: usize) -> Option<DispatchSet<G>> {
        if self.pending.is_empty() {
            return None;
        }
        let count = limit.min(self.pending.len());
        let waiters: Vec<Waiter<G>> = self.pending.drain(..count).collect();
        self.in_flight += 1;
        Some(DispatchSet::new(
            key.clone(),
            self.params.clone(),
            waiters,
            self.retry.clone(),
        ))
    }

    /// Nothing pending, scheduled or running: the context can leave the table
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty()
            && !self.timer.is_armed()
            && self.retries.is_empty()
            && self.in_flight == 0
    }

    /// Abort every timer and scheduled retry
    pub(crate) fn abort_tasks(&mut self) {
        self.timer.cancel();
        for (_, handle) in self.retries.drain() {
            handle.abort();
        }
    }
}
