//! Record storage for pending and resolved lookups
//!
//! This module provides the TTL-aware store that holds one record per
//! (batch key, identifier): either a pending handle callers join, or a
//! resolved value served from cache until it expires.

pub mod memory;
pub mod types;

pub use memory::MemoryRecordStore;
pub use types::{Admission, CacheEntry, Record, RecordStore};
