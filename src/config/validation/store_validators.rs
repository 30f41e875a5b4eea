//! Batch, retry and cache configuration validators

use super::trait_def::Validate;
use crate::config::models::*;

impl Validate for BatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("Batch limit must be greater than 0".to_string());
        }

        if self.enabled && self.tick_ms == 0 {
            return Err("Batch tick must be greater than 0 when batching is enabled".to_string());
        }

        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.scale.base_ms == 0 {
            return Err("Retry base delay must be greater than 0".to_string());
        }

        if !self.scale.mult.is_finite() || self.scale.mult < 1.0 {
            return Err(format!(
                "Retry multiplier must be a finite number >= 1.0, got {}",
                self.scale.mult
            ));
        }

        if self.max_delay_ms < self.scale.base_ms {
            return Err("Retry max delay must not be lower than the base delay".to_string());
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.ttl_ms == 0 {
            return Err("Cache TTL must be greater than 0".to_string());
        }

        Ok(())
    }
}
