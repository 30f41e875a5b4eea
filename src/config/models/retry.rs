//! Retry configuration types

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry failed dispatches at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum retries after the first failure
    #[serde(default = "default_max_retries")]
    pub max: u32,
    /// Backoff curve
    #[serde(default)]
    pub scale: ScaleConfig,
    /// Ceiling for a single backoff delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add up to +/-5% random jitter to each delay
    #[serde(default)]
    pub jitter: bool,
}

/// Exponential backoff curve: `base * mult^n`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// First retry delay (milliseconds)
    #[serde(default = "default_retry_base_ms")]
    pub base_ms: u64,
    /// Growth factor applied after each failure
    #[serde(default = "default_retry_mult")]
    pub mult: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max: default_max_retries(),
            scale: ScaleConfig::default(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            base_ms: default_retry_base_ms(),
            mult: default_retry_mult(),
        }
    }
}

impl RetryConfig {
    /// Failed dispatches reject their callers immediately
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// First retry delay
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.scale.base_ms)
    }

    /// Ceiling for a single delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
