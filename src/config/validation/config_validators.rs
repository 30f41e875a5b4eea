//! Top-level configuration validator

use super::trait_def::Validate;
use crate::config::Config;
use std::collections::HashSet;

impl Validate for Config {
    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for option in &self.unique_options {
            if option.trim().is_empty() {
                return Err("Unique option names cannot be empty".to_string());
            }
            if !seen.insert(option.as_str()) {
                return Err(format!("Duplicate unique option: {}", option));
            }
        }

        self.batch.validate_section("Batch")?;
        self.retry.validate_section("Retry")?;
        self.cache.validate_section("Cache")?;

        Ok(())
    }
}
