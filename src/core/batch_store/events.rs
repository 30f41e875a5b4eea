//! Lifecycle notifications
//!
//! Every admission and dispatch outcome is published as a [`BatchEvent`] on a
//! broadcast channel and logged through `tracing`. Publishing never fails:
//! with no subscriber the event is only logged, and lagging subscribers lose
//! the oldest events.

use crate::core::key::BatchKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Kind of lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchEventKind {
    /// Answered from a resolved record, or joined a pending one (`deferred`)
    CacheHit { deferred: bool },
    /// No live record; the identifier was queued
    CacheMiss,
    /// A dispatch set was sent to the getter
    Batch,
    /// The getter and parser succeeded
    BatchSuccess,
    /// The getter or parser failed
    BatchFailed { error: String, attempt: u32 },
    /// Retries exhausted or disabled; callers were rejected
    BatchCancelled { error: String },
}

impl BatchEventKind {
    /// Event name as published to observers
    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheHit { .. } => "cacheHit",
            Self::CacheMiss => "cacheMiss",
            Self::Batch => "batch",
            Self::BatchSuccess => "batchSuccess",
            Self::BatchFailed { .. } => "batchFailed",
            Self::BatchCancelled { .. } => "batchCancelled",
        }
    }
}

impl fmt::Display for BatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One lifecycle notification
#[derive(Debug, Clone)]
pub struct BatchEvent<Id, P> {
    pub kind: BatchEventKind,
    pub key: BatchKey,
    pub ids: Vec<Id>,
    pub params: P,
    /// Dispatch the event belongs to; `None` for admission events
    pub batch_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl<Id, P> BatchEvent<Id, P> {
    pub fn new(kind: BatchEventKind, key: BatchKey, ids: Vec<Id>, params: P) -> Self {
        Self {
            kind,
            key,
            ids,
            params,
            batch_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_batch_id(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Broadcast side of the event channel
pub(crate) struct EventSink<Id, P> {
    sender: broadcast::Sender<BatchEvent<Id, P>>,
}

impl<Id, P> EventSink<Id, P>
where
    Id: fmt::Debug + Clone,
    P: fmt::Debug + Clone,
{
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BatchEvent<Id, P>> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: BatchEvent<Id, P>) {
        match &event.kind {
            BatchEventKind::BatchFailed { error, attempt } => warn!(
                key = %event.key,
                ids = ?event.ids,
                attempt,
                "Batch failed: {}",
                error
            ),
            BatchEventKind::BatchCancelled { error } => warn!(
                key = %event.key,
                ids = ?event.ids,
                "Batch cancelled: {}",
                error
            ),
            kind => debug!(key = %event.key, ids = ?event.ids, "{}", kind),
        }

        if self.sender.receiver_count() > 0 {
            // Receivers may drop between the check and the send
            let _ = self.sender.send(event);
        }
    }
}
