//! Integration tests for batchstore
//!
//! These tests drive the store through its public API with recording
//! getters instead of mocks.

pub mod batching_tests;
pub mod retry_tests;
