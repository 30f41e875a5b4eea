//! Core functionality for the batch store
//!
//! This module contains the batch keys, the getter contract, deferred
//! handles, the record store and the batch coordinator built on them.

pub mod batch_store;
pub mod deferred;
pub mod getter;
pub mod key;
pub mod record_store;

pub use batch_store::{BatchEvent, BatchEventKind, BatchStore, StoreStats};
pub use deferred::{Deferred, DeferredHandle, Lookup, Outcome};
pub use getter::{Getter, IntoRecords, Records};
pub use key::{ABSENT_OPTION, BatchId, BatchKey, BatchParams, RecordKey};
pub use record_store::{Admission, CacheEntry, MemoryRecordStore, Record, RecordStore};
