use forcedash_core::Error;
use std::time::Duration;
use tokio::time::sleep;

/// How the delay grows between successive retries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// `initial_delay * retry`
    Linear,
    /// `initial_delay * multiplier^(retry - 1)`
    Exponential { multiplier: f64 },
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Add up to 30% random jitter in `retry_async`
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::network()
    }
}

impl BackoffPolicy {
    /// Task-status polling: 10s, 20s, 30s, capped at 30s
    pub fn polling() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Linear,
            jitter: false,
        }
    }

    /// Create a configuration for network operations
    pub fn network() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: true,
        }
    }

    /// Create a configuration for fast retries
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: true,
        }
    }

    /// Whether a failure that brought the retry counter to `retry` may be retried
    pub fn allows_retry(&self, retry: u32) -> bool {
        retry >= 1 && retry <= self.max_retries
    }

    /// Delay before retry number `retry` (1-based), without jitter
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.strategy {
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(retry),
            BackoffStrategy::Exponential { multiplier } => {
                let factor = multiplier.powi(retry as i32 - 1);
                Duration::from_secs_f64(
                    (self.initial_delay.as_secs_f64() * factor)
                        .min(self.max_delay.as_secs_f64()),
                )
            }
        };
        delay.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let extra = Duration::from_millis(
            (delay.as_millis() as f64 * rand::random::<f64>() * 0.3) as u64,
        );
        delay + extra
    }
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Check if this error should trigger a retry
    fn is_retryable(&self) -> bool;
}

impl RetryableError for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Timeout { .. } => true,
            // Server faults and throttling are transient
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl RetryableError for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
        )
    }
}

/// Execute an async operation, retrying retryable failures per `policy`
pub async fn retry_async<F, Fut, T, E>(policy: &BackoffPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                retry += 1;
                if !err.is_retryable() || !policy.allows_retry(retry) {
                    return Err(err);
                }

                let delay = policy.jittered(policy.delay_for(retry));
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    retry,
                    policy.max_retries + 1,
                    err,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
