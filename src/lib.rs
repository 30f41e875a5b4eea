//! # batchstore
//!
//! Request batching, deduplication and caching in front of slow or
//! rate-limited bulk-fetch operations.
//!
//! ## Features
//!
//! - **Batching**: lookups sharing the configured unique options are sent
//!   to the getter together once the size limit or the tick is reached
//! - **Deduplication**: an identifier already in flight is never fetched twice;
//!   every caller joins the same pending result
//! - **Caching**: resolved values, absent ones included, are served from a
//!   TTL-aware record store
//! - **Retries**: failed dispatches are retried with exponential backoff
//!   before their callers are rejected with the original error
//! - **Observability**: lifecycle events on a broadcast channel and `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use batchstore::{BatchStore, Config, Getter, IntoRecords, Records};
//! use std::collections::HashMap;
//!
//! struct Users;
//!
//! #[async_trait]
//! impl Getter for Users {
//!     type Id = u64;
//!     type Params = serde_json::Value;
//!     type Value = String;
//!     type Response = HashMap<u64, String>;
//!     type Error = String;
//!
//!     async fn fetch(
//!         &self,
//!         ids: &[u64],
//!         _params: &serde_json::Value,
//!     ) -> Result<Self::Response, String> {
//!         Ok(ids.iter().map(|id| (*id, format!("user-{}", id))).collect())
//!     }
//!
//!     fn parse_response(
//!         &self,
//!         response: Self::Response,
//!         ids: &[u64],
//!         _params: &serde_json::Value,
//!     ) -> Result<Records<u64, String>, String> {
//!         Ok(response.into_records(ids))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = BatchStore::new(Config::new(["language"]), Users)?;
//!     let params = serde_json::json!({"language": "fr"});
//!
//!     // Both lookups go out in a single fetch
//!     let (a, b) = tokio::join!(store.get(1, params.clone()), store.get(2, params));
//!     println!("{:?} {:?}", a?, b?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::{BatchConfig, CacheConfig, Config, RetryConfig, ScaleConfig};
pub use core::{
    BatchEvent, BatchEventKind, BatchKey, BatchParams, BatchStore, Getter, IntoRecords, Lookup,
    MemoryRecordStore, Outcome, Records, RecordStore, StoreStats,
};
pub use utils::error::{FetchError, Result, StoreError};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version number
    pub version: &'static str,
    /// Build timestamp, seconds since the epoch
    pub build_time: &'static str,
    /// Git commit hash
    pub git_hash: &'static str,
    /// Rust version
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
        }
    }
}

/// Build information of this binary
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
