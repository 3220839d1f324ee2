// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant operations
//!
//! This module provides:
//! - Retry with capped exponential backoff and a retry predicate
//! - Bounded waits for futures
//!
//! # Example
//!
//! ```rust
//! use storystream_resilience::{RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(4)
//!     .with_initial_delay(Duration::from_millis(1000))
//!     .with_max_delay(Duration::from_millis(2500));
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2500));
//!
//! let executor = RetryExecutor::<String>::new(policy)
//!     .with_should_retry(|e| !e.contains("unauthorized"));
//! # let _ = executor;
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{with_retry, RetryExecutor, RetryOutcome, RetryPolicy};
pub use timeout::{with_timeout, Timeout};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: RetryPolicy = RetryPolicy::default();
        let _: RetryExecutor<String> = RetryExecutor::new(RetryPolicy::default());
        let _: Timeout = Timeout::new(std::time::Duration::from_secs(5));
    }
}
