//! Batching configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Accumulate lookups into batches; when off every miss dispatches alone
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum identifiers per dispatch
    #[serde(default = "default_batch_limit")]
    pub limit: usize,
    /// Accumulation window in milliseconds
    #[serde(default = "default_batch_tick_ms")]
    pub tick_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_batch_limit(),
            tick_ms: default_batch_tick_ms(),
        }
    }
}

impl BatchConfig {
    /// Batching switched off: each miss is its own single-identifier dispatch
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Accumulation window
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
