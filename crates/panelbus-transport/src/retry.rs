//! Bounded retry with exponential backoff for transport writes.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Transport, TransportError};

/// Default number of write attempts (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default upper bound for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Retry policy for transport writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`. Attempt 0 has
    /// no delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(30);
        let factor = 1u32 << shift;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// A write that failed on every allowed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write to {port} failed after {attempts} attempt(s): {source}")]
pub struct RetryExhausted {
    pub port: String,
    pub attempts: u32,
    #[source]
    pub source: TransportError,
}

/// Writes a payload, retrying retryable failures per `policy`.
///
/// Returns the number of attempts used. Cancelling `cancel` aborts any
/// pending backoff wait and fails with `TransportError::Cancelled`.
pub async fn write_with_retry(
    transport: &dyn Transport,
    port: &str,
    payload: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<u32, RetryExhausted> {
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            return Err(exhausted(port, attempt - 1, TransportError::Cancelled));
        }

        let error = match transport.write(port, payload).await {
            Ok(()) => {
                if attempt > 1 {
                    debug!(port, attempt, "Write succeeded after retry");
                }
                return Ok(attempt);
            }
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= max_attempts {
            return Err(exhausted(port, attempt, error));
        }

        let delay = policy.delay_for(attempt);
        warn!(
            port,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Write failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(exhausted(port, attempt, TransportError::Cancelled));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn exhausted(port: &str, attempts: u32, source: TransportError) -> RetryExhausted {
    RetryExhausted {
        port: port.to_string(),
        attempts,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockTransport;

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        };

        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_millis(51_200));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(100), DEFAULT_MAX_DELAY);
        assert_eq!(policy.delay_for(6), DEFAULT_MAX_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let transport = MockTransport::new();
        transport.open("COM3").await.unwrap();
        transport.fail_next_writes(2).await;

        let attempts = write_with_retry(
            &transport,
            "COM3",
            "{}",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(transport.writes().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let transport = MockTransport::new();
        transport.open("COM3").await.unwrap();
        transport.fail_next_writes(5).await;

        let err = write_with_retry(
            &transport,
            "COM3",
            "{}",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(err.source.is_retryable());
        assert!(transport.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let transport = MockTransport::new();

        let err = write_with_retry(
            &transport,
            "COM9",
            "{}",
            &RetryPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(err.source, TransportError::PortNotOpen("COM9".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let transport = MockTransport::new();
        transport.open("COM3").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = write_with_retry(&transport, "COM3", "{}", &RetryPolicy::default(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.source, TransportError::Cancelled);
        assert_eq!(err.attempts, 0);
        assert!(transport.writes().await.is_empty());
    }
}
