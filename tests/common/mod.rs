//! Common test utilities for batchstore
//!
//! Getters that record every call so tests can assert on batching, plus the
//! configurations the suites share.

#![allow(dead_code)]

use async_trait::async_trait;
use batchstore::{BatchConfig, Config, Getter, IntoRecords, Records, RetryConfig, ScaleConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const FAILURE: &str = "Something went wrong";

/// One recorded getter invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub ids: Vec<String>,
    pub params: Value,
    pub at: Instant,
}

/// Getter that records calls, fails on demand and leaves chosen ids out
#[derive(Debug, Default)]
pub struct CountingGetter {
    calls: Mutex<Vec<Call>>,
    failures: AtomicU32,
    failing_language: Option<String>,
    absent: HashSet<String>,
    latency: Duration,
}

impl CountingGetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls, then succeed
    pub fn failing(n: u32) -> Self {
        Self {
            failures: AtomicU32::new(n),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    /// Fail every call whose `language` param is `language`
    pub fn failing_for(language: &str) -> Self {
        Self {
            failing_language: Some(language.to_string()),
            ..Self::default()
        }
    }

    /// Leave `ids` out of every response
    pub fn with_absent<I: IntoIterator<Item = &'static str>>(mut self, ids: I) -> Self {
        self.absent = ids.into_iter().map(String::from).collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_ids(&self) -> Vec<Vec<String>> {
        self.calls.lock().iter().map(|c| c.ids.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Value the getter produces for `id` under `params`
pub fn value_for(id: &str, params: &Value) -> String {
    let language = params
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or("none");
    format!("{}:{}", language, id)
}

#[async_trait]
impl Getter for CountingGetter {
    type Id = String;
    type Params = Value;
    type Value = String;
    type Response = Vec<(String, String)>;
    type Error = String;

    async fn fetch(&self, ids: &[String], params: &Value) -> Result<Self::Response, String> {
        self.calls.lock().push(Call {
            ids: ids.to_vec(),
            params: params.clone(),
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let language = params.get("language").and_then(Value::as_str);
        if self.failing_language.is_some() && self.failing_language.as_deref() == language {
            return Err(FAILURE.to_string());
        }

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FAILURE.to_string());
        }

        Ok(ids
            .iter()
            .filter(|id| !self.absent.contains(*id))
            .map(|id| (id.clone(), value_for(id, params)))
            .collect())
    }

    fn parse_response(
        &self,
        response: Self::Response,
        ids: &[String],
        _params: &Value,
    ) -> Result<Records<String, String>, String> {
        Ok(response.into_records(ids))
    }
}

/// Getter answering positionally, mapped back by a custom parser
#[derive(Debug, Default)]
pub struct PositionalGetter {
    calls: AtomicU32,
}

impl PositionalGetter {
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Getter for PositionalGetter {
    type Id = u32;
    type Params = ();
    type Value = u32;
    type Response = Vec<Option<u32>>;
    type Error = String;

    async fn fetch(&self, ids: &[u32], _params: &()) -> Result<Vec<Option<u32>>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Odd identifiers are unknown upstream
        Ok(ids
            .iter()
            .map(|id| (id % 2 == 0).then_some(id * 100))
            .collect())
    }

    fn parse_response(
        &self,
        response: Vec<Option<u32>>,
        ids: &[u32],
        _params: &(),
    ) -> Result<Records<u32, u32>, String> {
        if response.len() != ids.len() {
            return Err(format!(
                "expected {} values, got {}",
                ids.len(),
                response.len()
            ));
        }
        Ok(ids
            .iter()
            .zip(response)
            .filter_map(|(id, value)| value.map(|v| (*id, v)))
            .collect())
    }
}

/// `{uniqueOptions: [language], batch: {limit: 10, tick: 5}, retry disabled}`
pub fn example_config() -> Config {
    Config::new(["language"])
        .with_batch(BatchConfig {
            enabled: true,
            limit: 10,
            tick_ms: 5,
        })
        .with_retry(RetryConfig::disabled())
}

/// Example configuration with retries enabled
pub fn retrying_config(max: u32, base_ms: u64, mult: f64) -> Config {
    example_config().with_retry(RetryConfig {
        enabled: true,
        max,
        scale: ScaleConfig { base_ms, mult },
        ..RetryConfig::default()
    })
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Assert `actual` is `expected_ms`, allowing for timer wheel rounding
pub fn assert_elapsed(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(1),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
