//! Utility modules for the batch store
//!
//! - **error**: error taxonomy and the retry backoff state machine
//! - **logging**: `tracing` subscriber setup

pub mod error;
pub mod logging;

pub use error::{Backoff, BackoffStep, FetchError, Result, StoreError};
pub use logging::{LogFormat, init_logging};
