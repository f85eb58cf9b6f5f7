use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classification of a failed call for the retry executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableError {
    /// 429 Too Many Requests
    RateLimit,
    /// 5xx from the provider
    ServerError,
    /// Timeout or broken connection
    Timeout,
    /// Anything else - never retried
    Other,
}

impl RetryableError {
    pub fn is_retryable(self) -> bool {
        !matches!(self, RetryableError::Other)
    }
}

/// Retry policy composed around a single provider call.
///
/// `max_retries` counts retries after the initial attempt, so a policy with
/// `max_retries = 3` makes at most four calls. The delay before retry `n`
/// (0-indexed) is `base_delay * multiplier^n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    /// Three retries with 1s, 2s, 4s backoff
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier: 2,
        }
    }

    /// Retries back to back with no sleep in between
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::immediate(0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry number `attempt` (0-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `operation` until it succeeds, hits a non-retryable error, or the
/// policy is exhausted. The last error is returned on failure.
///
/// # Example
/// ```ignore
/// let price = retry_with_policy(
///     || async { client.fetch(symbol).await },
///     &RetryPolicy::default(),
///     |e: &ProviderError| e.retry_class(),
/// ).await?;
/// ```
pub async fn retry_with_policy<F, Fut, T, E>(
    mut operation: F,
    policy: &RetryPolicy,
    classify_error: impl Fn(&E) -> RetryableError,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Call succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let error_type = classify_error(&e);

                if !error_type.is_retryable() {
                    debug!("Non-retryable failure, giving up: {}", e);
                    return Err(e);
                }

                if attempt >= policy.max_retries {
                    warn!(
                        "Giving up after {} attempts ({:?}): {}",
                        attempt + 1,
                        error_type,
                        e
                    );
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} failed ({:?}): {} - retrying in {}ms",
                    attempt + 1,
                    policy.max_attempts(),
                    error_type,
                    e,
                    delay.as_millis()
                );

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                attempt += 1;
            }
        }
    }
}
