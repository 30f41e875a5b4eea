//! Deferred results for pending lookups
//!
//! A [`Deferred`] is the settle side of a pending record: the dispatch that
//! owns the identifier resolves or rejects it exactly once. Every caller that
//! asked for the identifier meanwhile holds a clone of the same
//! [`DeferredHandle`] and observes the same outcome.

use crate::utils::error::FetchError;
use futures::future::{BoxFuture, FutureExt, Shared};
use pin_project_lite::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Settled result of one lookup: a value (possibly absent) or a rejection
pub type Outcome<V, E> = Result<Option<V>, FetchError<E>>;

/// Settle side of a pending lookup
pub struct Deferred<V, E> {
    tx: oneshot::Sender<Outcome<V, E>>,
}

impl<V, E> Deferred<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a settle side and the handle callers wait on.
    ///
    /// Dropping the `Deferred` without settling it settles the handle with
    /// [`FetchError::Closed`].
    pub fn new() -> (Self, DeferredHandle<V, E>) {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|received| received.unwrap_or(Err(FetchError::Closed)))
            .boxed()
            .shared();
        (Self { tx }, DeferredHandle { inner })
    }

    /// Resolve with a value; `None` is a valid, absent result
    pub fn resolve(self, value: Option<V>) {
        self.settle(Ok(value));
    }

    /// Reject with the getter's error
    pub fn reject(self, error: E) {
        self.settle(Err(FetchError::Getter(error)));
    }

    /// Settle with an arbitrary outcome
    pub fn settle(self, outcome: Outcome<V, E>) {
        // Every handle may already be gone; nobody is waiting then
        let _ = self.tx.send(outcome);
    }
}

impl<V, E> fmt::Debug for Deferred<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("waiting", &!self.tx.is_closed())
            .finish()
    }
}

/// Cloneable future resolving to the outcome of a pending lookup
pub struct DeferredHandle<V, E> {
    inner: Shared<BoxFuture<'static, Outcome<V, E>>>,
}

impl<V, E> Clone for DeferredHandle<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Clone, E: Clone> DeferredHandle<V, E> {
    /// The outcome, once the owning dispatch has settled and a waiter observed it
    pub fn peek(&self) -> Option<&Outcome<V, E>> {
        self.inner.peek()
    }
}

impl<V, E> fmt::Debug for DeferredHandle<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredHandle").finish_non_exhaustive()
    }
}

impl<V: Clone, E: Clone> Future for DeferredHandle<V, E> {
    type Output = Outcome<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

pin_project! {
    /// Future returned by an admission.
    ///
    /// `Ready` is a cache hit and completes on every poll without any
    /// dispatch; `Deferred` waits on the dispatch that owns the identifier.
    #[project = LookupProj]
    pub enum Lookup<V, E> {
        Ready { value: Outcome<V, E> },
        Deferred { #[pin] handle: DeferredHandle<V, E> },
    }
}

impl<V, E> Lookup<V, E> {
    /// A lookup already answered from cache
    pub fn ready(value: Option<V>) -> Self {
        Self::Ready { value: Ok(value) }
    }

    /// A lookup waiting on a pending record
    pub fn deferred(handle: DeferredHandle<V, E>) -> Self {
        Self::Deferred { handle }
    }

    /// Whether the lookup was served from cache
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

impl<V, E> fmt::Debug for Lookup<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { .. } => f.write_str("Lookup::Ready"),
            Self::Deferred { .. } => f.write_str("Lookup::Deferred"),
        }
    }
}

impl<V: Clone, E: Clone> Future for Lookup<V, E> {
    type Output = Outcome<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            LookupProj::Ready { value } => Poll::Ready(value.clone()),
            LookupProj::Deferred { handle } => handle.poll(cx),
        }
    }
}
