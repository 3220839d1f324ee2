//! Retry configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storystream_resilience::RetryPolicy;

/// Backoff applied to network-facing collaborators such as stream URL resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial call
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Cap on any single delay
    pub max_delay_ms: u64,

    /// Bound on a single attempt; an attempt that runs longer counts as a failure
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    /// Converts the section into a runtime policy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.multiplier)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 2_500,
            attempt_timeout_ms: 5_000,
        }
    }
}

impl ConfigSection for RetryConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = vec![
            Validator::in_range(self.max_attempts, 1, 10, "retry.max_attempts"),
            Validator::in_range(self.multiplier, 1.0, 10.0, "retry.multiplier"),
            Validator::in_range(self.max_delay_ms, 1, 300_000, "retry.max_delay_ms"),
            Validator::in_range(
                self.attempt_timeout_ms,
                100,
                60_000,
                "retry.attempt_timeout_ms",
            ),
            Validator::ordered(
                self.initial_delay_ms,
                self.max_delay_ms,
                "retry.initial_delay_ms",
                "retry.max_delay_ms",
            ),
        ];

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "retry"
    }
}
