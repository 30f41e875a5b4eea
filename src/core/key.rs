//! Batch partitioning keys
//!
//! A [`BatchKey`] is derived from the configured unique options and the
//! values a request's parameters carry for them. Lookups batch together if
//! and only if their keys are equal. A [`RecordKey`] pairs a batch key with
//! one identifier and addresses a single record in the store.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// Rendering of an option the parameters do not carry
pub const ABSENT_OPTION: &str = "undefined";

/// Identifier accepted by the getter
pub trait BatchId: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> BatchId for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{}

/// Shared parameters attached to a lookup
pub trait BatchParams: Clone + fmt::Debug + Send + Sync + 'static {
    /// Value of a named option, `None` when the parameters do not carry it
    fn option(&self, name: &str) -> Option<String>;
}

impl<S> BatchParams for HashMap<String, String, S>
where
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    fn option(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl BatchParams for BTreeMap<String, String> {
    fn option(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl BatchParams for Value {
    fn option(&self, name: &str) -> Option<String> {
        match self.as_object()?.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl BatchParams for () {
    fn option(&self, _name: &str) -> Option<String> {
        None
    }
}

impl<P: BatchParams> BatchParams for Option<P> {
    fn option(&self, name: &str) -> Option<String> {
        self.as_ref()?.option(name)
    }
}

/// Partition key shared by every lookup that may be dispatched together
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey(Arc<str>);

impl BatchKey {
    /// Derive the key as `name=value` pairs joined by `;`, in configured order
    pub fn derive<P: BatchParams>(unique_options: &[String], params: &P) -> Self {
        let key = unique_options
            .iter()
            .map(|name| {
                let value = params.option(name);
                format!("{}={}", name, value.as_deref().unwrap_or(ABSENT_OPTION))
            })
            .collect::<Vec<_>>()
            .join(";");
        Self(Arc::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

/// Address of one record: a batch key plus an identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey<Id> {
    pub batch_key: BatchKey,
    pub id: Id,
}

impl<Id> RecordKey<Id> {
    pub fn new(batch_key: BatchKey, id: Id) -> Self {
        Self { batch_key, id }
    }
}

impl<Id: fmt::Display> fmt::Display for RecordKey<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.batch_key, self.id)
    }
}
