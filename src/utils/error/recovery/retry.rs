//! Retry mechanism with exponential backoff

use super::types::BackoffStep;
use crate::config::RetryConfig;
use std::time::Duration;
use tracing::{debug, error};

/// Exponential backoff state for one dispatch set.
///
/// Counts consecutive failed dispatches. A failure either yields the delay
/// before the next attempt (`base`, `base * mult`, `base * mult^2`, ...
/// capped at `max_delay`) or ends the episode once `max` retries have been
/// spent or retries are disabled. Any success resets the episode.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    attempts: u32,
    scale: Duration,
}

impl Backoff {
    /// Create a new backoff at the start of an episode
    pub fn new(config: RetryConfig) -> Self {
        let scale = config.base_delay();
        Self {
            config,
            attempts: 0,
            scale,
        }
    }

    /// Consecutive failures in the current episode
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the next failure would wait before retrying
    pub fn scale(&self) -> Duration {
        self.scale
    }

    /// End the episode after a successful dispatch
    pub fn on_success(&mut self) {
        if self.attempts > 0 {
            debug!("Dispatch succeeded after {} failed attempts", self.attempts);
        }
        self.reset();
    }

    /// Start a fresh episode, e.g. after the previous one was cancelled
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.scale = self.config.base_delay();
    }

    /// Record a failed dispatch and decide whether to retry
    pub fn on_failure(&mut self) -> BackoffStep {
        self.attempts += 1;

        if !self.config.enabled {
            return BackoffStep::Cancel {
                attempts: self.attempts,
            };
        }

        if self.attempts > self.config.max {
            error!("Retry failed after {} attempts", self.attempts);
            return BackoffStep::Cancel {
                attempts: self.attempts,
            };
        }

        let delay = if self.config.jitter {
            let jitter_factor = 0.1;
            let jitter =
                self.scale.as_millis() as f64 * jitter_factor * (rand::random::<f64>() - 0.5);
            Duration::from_millis((self.scale.as_millis() as f64 + jitter).max(0.0) as u64)
        } else {
            self.scale
        };

        // Calculate next delay with exponential backoff
        self.scale = std::cmp::min(
            Duration::from_nanos(
                (self.scale.as_nanos() as f64 * self.config.scale.mult).round() as u64,
            ),
            self.config.max_delay(),
        );

        debug!("Attempt {} failed, retrying in {:?}", self.attempts, delay);

        BackoffStep::Retry {
            attempt: self.attempts,
            delay,
        }
    }
}
