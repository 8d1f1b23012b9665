// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic retry policies and backoff strategies.
//!
//! The request pipeline implements its own bespoke failover loop (node
//! rotation, ping/sniff, resurrection) and does not use this module directly.
//! This is the ambient retry utility for callers who wrap a [`crate::Transport`]
//! call with an outer retry (e.g. a bulk indexer retrying a whole batch).
//!
//! ```
//! use elastic_transport_rs::runtime::{RetryConfig, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let retry = RetryConfig::builder()
//!     .max_retries(3)
//!     .backoff(ExponentialBackoff::new(Duration::from_millis(100)))
//!     .build();
//! ```

use std::time::Duration;

use crate::error::TransportError;

/// Defines a backoff strategy for retry delays.
pub trait BackoffStrategy: Clone + Send + Sync + 'static {
    /// Calculate the delay before the next retry attempt.
    ///
    /// # Arguments
    /// * `attempt` - The current attempt number (0-indexed)
    fn delay(&self, attempt: u32) -> Duration;
}

/// No delay between retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl NoBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackoffStrategy for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Fixed delay between retries.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Linear backoff - delay increases linearly with each attempt.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    initial_delay: Duration,
    increment: Duration,
    max_delay: Duration,
}

impl LinearBackoff {
    #[must_use]
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            increment: initial_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay + self.increment * attempt;
        delay.min(self.max_delay)
    }
}

/// Exponential backoff - delay doubles with each attempt.
///
/// Optionally includes jitter to prevent thundering herd.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_range = capped_delay * 0.25;
            let jitter = (attempt as f64 * 0.1).sin().abs() * jitter_range;
            capped_delay + jitter
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Determines whether a [`TransportError`] should be retried.
pub trait RetryPolicy: Clone + Send + Sync + 'static {
    fn should_retry(&self, error: &TransportError) -> bool;
}

/// Default retry policy: retries whatever the error taxonomy itself marks
/// recoverable (see [`TransportError::is_recoverable`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, error: &TransportError) -> bool {
        error.is_recoverable()
    }
}

/// Never retry - fail immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _error: &TransportError) -> bool {
        false
    }
}

/// Complete retry configuration combining policy and backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig<P: RetryPolicy = DefaultRetryPolicy, B: BackoffStrategy = ExponentialBackoff>
{
    pub max_retries: u32,
    pub policy: P,
    pub backoff: B,
    pub total_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            policy: DefaultRetryPolicy,
            backoff: ExponentialBackoff::default(),
            total_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
        RetryConfigBuilder::new()
    }

    #[must_use]
    pub fn disabled() -> RetryConfig<NoRetryPolicy, NoBackoff> {
        RetryConfig {
            max_retries: 0,
            policy: NoRetryPolicy,
            backoff: NoBackoff,
            total_timeout: None,
        }
    }
}

impl<P: RetryPolicy, B: BackoffStrategy> RetryConfig<P, B> {
    /// Execute an async operation with retry logic.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let start = std::time::Instant::now();
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !self.policy.should_retry(&e) {
                        return Err(e);
                    }
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    if let Some(timeout) = self.total_timeout {
                        if start.elapsed() >= timeout {
                            return Err(e);
                        }
                    }

                    let delay = self.backoff.delay(attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder<P: RetryPolicy, B: BackoffStrategy> {
    max_retries: u32,
    policy: P,
    backoff: B,
    total_timeout: Option<Duration>,
}

impl RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            policy: DefaultRetryPolicy,
            backoff: ExponentialBackoff::default(),
            total_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for RetryConfigBuilder<DefaultRetryPolicy, ExponentialBackoff> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RetryPolicy, B: BackoffStrategy> RetryConfigBuilder<P, B> {
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    #[must_use]
    pub fn policy<P2: RetryPolicy>(self, policy: P2) -> RetryConfigBuilder<P2, B> {
        RetryConfigBuilder {
            max_retries: self.max_retries,
            policy,
            backoff: self.backoff,
            total_timeout: self.total_timeout,
        }
    }

    #[must_use]
    pub fn backoff<B2: BackoffStrategy>(self, backoff: B2) -> RetryConfigBuilder<P, B2> {
        RetryConfigBuilder {
            max_retries: self.max_retries,
            policy: self.policy,
            backoff,
            total_timeout: self.total_timeout,
        }
    }

    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn no_total_timeout(mut self) -> Self {
        self.total_timeout = None;
        self
    }

    #[must_use]
    pub fn build(self) -> RetryConfig<P, B> {
        RetryConfig {
            max_retries: self.max_retries,
            policy: self.policy,
            backoff: self.backoff,
            total_timeout: self.total_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineFailure;

    #[test]
    fn test_no_backoff() {
        let backoff = NoBackoff::new();
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(100), Duration::ZERO);
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = FixedBackoff::from_millis(100);
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(100), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_backoff() {
        let backoff = LinearBackoff::new(Duration::from_millis(100))
            .with_increment(Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(150));
        assert_eq!(backoff.delay(10), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(false);

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_backoff_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500))
            .with_jitter(false);

        assert_eq!(backoff.delay(5), Duration::from_millis(500));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = DefaultRetryPolicy;
        let recoverable = TransportError::pipeline(PipelineFailure::BadResponse, "502");
        let fatal = TransportError::pipeline(PipelineFailure::BadAuthentication, "401");

        assert!(policy.should_retry(&recoverable));
        assert!(!policy.should_retry(&fatal));
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = NoRetryPolicy;
        let recoverable = TransportError::pipeline(PipelineFailure::BadResponse, "502");
        assert!(!policy.should_retry(&recoverable));
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::builder()
            .max_retries(5)
            .backoff(FixedBackoff::from_millis(200))
            .total_timeout(Duration::from_secs(60))
            .build();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.total_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_retry_config_disabled() {
        let config = RetryConfig::disabled();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.total_timeout, None);
    }

    #[tokio::test]
    async fn test_retry_execute_success() {
        let config = RetryConfig::default();
        let result = config.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_execute_transient_failure() {
        let config = RetryConfig::builder()
            .max_retries(3)
            .backoff(NoBackoff::new())
            .build();

        let call_count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = config
            .execute(|| {
                let count = call_count_clone.clone();
                async move {
                    let n = count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if n < 2 {
                        Err(TransportError::pipeline(PipelineFailure::BadResponse, "transient"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_execute_permanent_failure() {
        let config = RetryConfig::builder()
            .max_retries(3)
            .backoff(NoBackoff::new())
            .build();

        let result: Result<i32, TransportError> = config
            .execute(|| async {
                Err(TransportError::pipeline(PipelineFailure::BadAuthentication, "401"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().reason(), Some(PipelineFailure::BadAuthentication));
    }
}
