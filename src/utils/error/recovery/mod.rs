//! Error recovery utilities
//!
//! This module provides the exponential backoff state machine that drives
//! retries of failed batch dispatches.

mod retry;
mod types;

pub use retry::Backoff;
pub use types::BackoffStep;
