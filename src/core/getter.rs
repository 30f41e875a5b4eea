//! Bulk-fetch contract the store batches in front of
//!
//! A [`Getter`] fetches many identifiers sharing one set of parameters in a
//! single call. Its raw response, of any type, is mapped back onto the
//! requested identifiers by [`Getter::parse_response`]. Responses already
//! keyed by identifier pass through [`IntoRecords::into_records`].

use super::key::{BatchId, BatchParams};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Per-identifier values produced by one dispatch
pub type Records<Id, V> = HashMap<Id, V>;

/// A raw getter response that already carries values keyed by identifier
pub trait IntoRecords<Id, V> {
    /// Keep the values for the requested identifiers
    fn into_records(self, ids: &[Id]) -> Records<Id, V>;
}

impl<Id: BatchId, V> IntoRecords<Id, V> for HashMap<Id, V> {
    fn into_records(self, _ids: &[Id]) -> Records<Id, V> {
        self
    }
}

impl<Id: BatchId, V> IntoRecords<Id, V> for Vec<(Id, V)> {
    fn into_records(self, _ids: &[Id]) -> Records<Id, V> {
        self.into_iter().collect()
    }
}

/// Bulk-fetch operation
#[async_trait]
pub trait Getter: Send + Sync + 'static {
    /// Identifier type
    type Id: BatchId;
    /// Shared parameters type
    type Params: BatchParams;
    /// Resolved value for one identifier
    type Value: Clone + Send + Sync + 'static;
    /// Raw response of one fetch
    type Response: Send + 'static;
    /// Error returned by a failed fetch or parse, handed unchanged to callers
    type Error: Clone + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Fetch every identifier in `ids` with the shared `params`
    async fn fetch(
        &self,
        ids: &[Self::Id],
        params: &Self::Params,
    ) -> Result<Self::Response, Self::Error>;

    /// Map a raw response onto the requested identifiers.
    ///
    /// Identifiers missing from the result resolve as absent, so a partial
    /// response is not an error. An `Err` here fails the whole dispatch.
    /// Keyed responses only need `Ok(response.into_records(ids))`.
    fn parse_response(
        &self,
        response: Self::Response,
        ids: &[Self::Id],
        params: &Self::Params,
    ) -> Result<Records<Self::Id, Self::Value>, Self::Error>;
}
