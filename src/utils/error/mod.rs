//! Error Handling utilities
//!
//! This module provides the store error taxonomy and the backoff policy used
//! to recover from failed dispatches.

pub mod error;
pub mod recovery;

// Re-export commonly used types and functions
pub use error::*;
pub use recovery::{Backoff, BackoffStep};
