//! Configuration data models
//!
//! This module defines all configuration structures used by the batch store.

#![allow(missing_docs)]

pub mod batch;
pub mod cache;
pub mod retry;

// Re-export all configuration types
pub use batch::*;
pub use cache::*;
pub use retry::*;

/// Default maximum identifiers per dispatch
pub fn default_batch_limit() -> usize {
    100
}

/// Default accumulation window in milliseconds
pub fn default_batch_tick_ms() -> u64 {
    50
}

/// Default maximum retry attempts
pub fn default_max_retries() -> u32 {
    3
}

pub fn default_retry_base_ms() -> u64 {
    5
}

pub fn default_retry_mult() -> f64 {
    3.0
}

pub fn default_max_delay_ms() -> u64 {
    30_000
}

pub fn default_cache_ttl_ms() -> u64 {
    60_000 // 1 minute
}

pub fn default_true() -> bool {
    true
}
