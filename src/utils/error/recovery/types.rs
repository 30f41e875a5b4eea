//! Types for error recovery patterns

use std::time::Duration;

/// What to do after a dispatch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Re-dispatch the same identifiers after `delay`
    Retry {
        /// Consecutive failures so far in this episode
        attempt: u32,
        /// Wait before the re-dispatch
        delay: Duration,
    },
    /// Give up and reject every waiting caller
    Cancel {
        /// Consecutive failures when the episode ended
        attempts: u32,
    },
}

impl BackoffStep {
    /// Whether the episode ended
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel { .. })
    }

    /// Consecutive failures counted by this step
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Retry { attempt, .. } => *attempt,
            Self::Cancel { attempts } => *attempts,
        }
    }
}
