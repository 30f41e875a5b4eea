//! Batch coordination
//!
//! This module groups lookups into batch contexts, dispatches them to the
//! getter, and drives retries and caching of the results.

mod context;
mod coordinator;
mod events;
mod stats;


pub use coordinator::BatchStore;
pub use events::{BatchEvent, BatchEventKind};
pub use stats::StoreStats;
