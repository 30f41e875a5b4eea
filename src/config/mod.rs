//! Configuration management for the batch store
//!
//! This module handles loading, validation, and management of store configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Prefix shared by every environment variable the store reads
pub const ENV_PREFIX: &str = "BATCHSTORE_";

/// Main configuration struct for the batch store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Parameter names whose values partition lookups into batches, in key order
    #[serde(default)]
    pub unique_options: Vec<String>,
    /// Accumulation window and size threshold
    #[serde(default)]
    pub batch: BatchConfig,
    /// Backoff policy for failed dispatches
    #[serde(default)]
    pub retry: RetryConfig,
    /// Resolved record caching
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Create a configuration partitioned on the given option names
    pub fn new<I, S>(unique_options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique_options: unique_options.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set batching options
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Set retry options
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set cache options
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path).await?;

        let config = Self::from_yaml_str(&content)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `BATCHSTORE_*` environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment overrides from {:?}", path);
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup, starting from defaults
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));
        let mut config = Self::default();

        if let Some(options) = var("UNIQUE_OPTIONS") {
            config.unique_options = options
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = parse_var(&var, "BATCH_ENABLED")? {
            config.batch.enabled = v;
        }
        if let Some(v) = parse_var(&var, "BATCH_LIMIT")? {
            config.batch.limit = v;
        }
        if let Some(v) = parse_var(&var, "BATCH_TICK_MS")? {
            config.batch.tick_ms = v;
        }
        if let Some(v) = parse_var(&var, "RETRY_ENABLED")? {
            config.retry.enabled = v;
        }
        if let Some(v) = parse_var(&var, "RETRY_MAX")? {
            config.retry.max = v;
        }
        if let Some(v) = parse_var(&var, "RETRY_BASE_MS")? {
            config.retry.scale.base_ms = v;
        }
        if let Some(v) = parse_var(&var, "RETRY_MULT")? {
            config.retry.scale.mult = v;
        }
        if let Some(v) = parse_var(&var, "CACHE_ENABLED")? {
            config.cache.enabled = v;
        }
        if let Some(v) = parse_var(&var, "CACHE_TTL_MS")? {
            config.cache.ttl_ms = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        Validate::validate(self).map_err(StoreError::Config)?;

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_var<T, F>(var: &F, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(suffix) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            StoreError::Config(format!("Invalid value for {}{}: {}", ENV_PREFIX, suffix, e))
        }),
    }
}
