// crates/resilience/src/retry.rs
//! Retry policies with exponential backoff

use crate::error::{ResilienceError, ResilienceResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    max_attempts: u32,
    /// Delay before the first retry
    initial_delay: Duration,
    /// Maximum delay between retries
    max_delay: Duration,
    /// Backoff multiplier
    multiplier: f64,
}

impl RetryPolicy {
    /// Creates a new retry policy
    ///
    /// `max_attempts` bounds the retries; the initial call always happens, so
    /// an operation runs at most `max_attempts + 1` times.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Sets the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier
    ///
    /// Values below 1.0 (and NaN) are treated as 1.0 so delays never shrink.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        self
    }

    /// Calculates the delay that follows the failed attempt `attempt` (1-based)
    ///
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`; attempt 0 has no delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }

    /// Upper bound on the total time spent waiting between attempts
    pub fn max_total_wait(&self) -> Duration {
        self.max_delay.saturating_mul(self.max_attempts)
    }

    /// Returns the maximum number of retries
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on invocations of the operation, the initial call included
    pub fn max_invocations(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Result of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on attempt `attempts`
    Success { value: T, attempts: u32 },
    /// The operation was invoked `attempts` times; `error` is the last failure
    Failure { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Drops the attempt count and returns the value or the last error
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryObserver<E> = Arc<dyn Fn(u32, Duration, &E) + Send + Sync>;

/// Runs async operations under a [`RetryPolicy`]
///
/// The operation receives the 1-based attempt number. Failures are retried
/// unless the `should_retry` predicate rejects them; the observer is told
/// about every retry (attempt that failed, delay about to be waited, error)
/// before the backoff wait starts.
pub struct RetryExecutor<E> {
    policy: RetryPolicy,
    should_retry: Option<RetryPredicate<E>>,
    observer: Option<RetryObserver<E>>,
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            should_retry: self.should_retry.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("has_predicate", &self.should_retry.is_some())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl<E: fmt::Display> RetryExecutor<E> {
    /// Creates an executor that retries every failure
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            should_retry: None,
            observer: None,
        }
    }

    /// Only failures accepted by `predicate` are retried
    pub fn with_should_retry<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Registers an observer called as `(attempt, delay, error)` before each retry
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: Fn(u32, Duration, &E) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes an operation, returning the outcome as a value
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_invocations = self.policy.max_invocations();
        let mut attempt: u32 = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("Operation succeeded on attempt {}", attempt);
                    }
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    let retryable = self.should_retry.as_ref().map_or(true, |p| p(&error));
                    if !retryable {
                        log::debug!("Attempt {} failed with non-retryable error: {}", attempt, error);
                        return RetryOutcome::Failure {
                            error,
                            attempts: attempt,
                        };
                    }

                    if attempt >= max_invocations {
                        log::warn!("All {} attempts failed, last error: {}", attempt, error);
                        return RetryOutcome::Failure {
                            error,
                            attempts: attempt,
                        };
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    if let Some(observer) = &self.observer {
                        observer(attempt, delay, &error);
                    }
                    log::debug!("Attempt {} failed: {}; retrying in {:?}", attempt, error, delay);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Executes an operation, returning the last error directly on failure
    pub async fn execute_or_raise<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute(operation).await.into_result()
    }
}

/// Executes an operation with retry logic, flattening failure into
/// [`ResilienceError::RetriesExhausted`]
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> ResilienceResult<T>
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match RetryExecutor::new(policy.clone()).execute(operation).await {
        RetryOutcome::Success { value, .. } => Ok(value),
        RetryOutcome::Failure { error, attempts } => Err(ResilienceError::RetriesExhausted {
            attempts,
            last_error: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn backoff_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_delay(Duration::from_millis(1000))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_millis(2500))
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.initial_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(60))
            .with_multiplier(3.0);

        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(200));
        assert_eq!(policy.max_delay(), Duration::from_secs(60));
        assert_eq!(policy.multiplier(), 3.0);
    }

    #[test]
    fn test_zero_retries_still_runs_once() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts(), 0);
        assert_eq!(policy.max_invocations(), 1);
        assert_eq!(policy.max_total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_multiplier_below_one_is_ignored() {
        assert_eq!(RetryPolicy::new(3).with_multiplier(0.5).multiplier(), 1.0);
        assert_eq!(RetryPolicy::new(3).with_multiplier(f64::NAN).multiplier(), 1.0);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = backoff_policy(4);

        let delays: Vec<u64> = (1..=4)
            .map(|n| policy.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 2500, 2500]);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_millis(2500));
    }

    #[test]
    fn test_max_total_wait() {
        assert_eq!(backoff_policy(4).max_total_wait(), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let executor = RetryExecutor::<String>::new(RetryPolicy::new(3));

        let outcome = executor.execute(|_| async { Ok::<_, String>(42) }).await;

        assert_eq!(outcome, RetryOutcome::Success { value: 42, attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_reports_attempt() {
        let executor = RetryExecutor::new(RetryPolicy::new(5));

        let outcome = executor
            .execute(|attempt| async move {
                if attempt < 3 {
                    Err(format!("attempt {} failed", attempt))
                } else {
                    Ok(attempt * 10)
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Success { value: 30, attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_delays_when_always_failing() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        let executor = RetryExecutor::new(backoff_policy(4)).with_observer(move |attempt, delay, _: &String| {
            sink.lock().unwrap().push((attempt, delay.as_millis() as u64));
        });

        let outcome = executor
            .execute(|_| async { Err::<(), _>("down".to_string()) })
            .await;

        assert_eq!(
            outcome,
            RetryOutcome::Failure {
                error: "down".to_string(),
                attempts: 5
            }
        );
        assert_eq!(
            *observed.lock().unwrap(),
            vec![(1, 1000), (2, 2000), (3, 2500), (4, 2500)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_final_attempt() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        let executor = RetryExecutor::new(backoff_policy(4))
            .with_observer(move |_, delay, _: &String| sink.lock().unwrap().push(delay));

        let start = tokio::time::Instant::now();
        let outcome = executor
            .execute(|_| async { Err::<(), _>("down".to_string()) })
            .await;

        assert_eq!(outcome.attempts(), 5);
        assert_eq!(observed.lock().unwrap().len(), 4);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(8000));
        assert!(waited <= Duration::from_millis(8010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_retry_stops_early() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let executor = RetryExecutor::new(RetryPolicy::new(5))
            .with_should_retry(|e: &String| !e.starts_with("fatal"));

        let outcome = executor
            .execute(move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("fatal: unauthorized".to_string())
                }
            })
            .await;

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.error().map(String::as_str), Some("fatal: unauthorized"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_or_raise_returns_last_error() {
        let executor = RetryExecutor::new(RetryPolicy::new(2));

        let result = executor
            .execute_or_raise(|attempt| async move { Err::<(), _>(format!("failure {}", attempt)) })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_all_attempts_fail() {
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1));

        let result = with_retry(&policy, |_| async { Err::<i32, _>("persistent error") }).await;

        match result {
            Err(ResilienceError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "persistent error");
            }
            other => panic!("Expected RetriesExhausted error, got {:?}", other),
        }
    }
}
