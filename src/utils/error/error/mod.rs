//! Error handling for the batch store
//!
//! This module defines the error types used throughout the store.

#![allow(missing_docs)]

mod helpers;
mod types;

pub use types::{FetchError, Result, StoreError};
