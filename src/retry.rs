//! Retry logic with per-attempt timeout and fixed backoff
//!
//! [`attempt`] runs a fallible async operation up to `max_attempts` times. Each
//! attempt is bounded by `attempt_timeout`; an attempt that runs out of time is
//! abandoned and counted as failed. Between failures the wrapper sleeps for
//! `backoff` (fixed unless a multiplier or jitter is configured).
//!
//! # Example
//!
//! ```no_run
//! use batchpipe::config::RetryConfig;
//! use batchpipe::error::FetchError;
//! use batchpipe::retry::attempt;
//!
//! # async fn example() -> batchpipe::Result<()> {
//! let policy = RetryConfig::default();
//! let body = attempt(&policy, || async {
//!     Ok::<_, FetchError>(b"payload".to_vec())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            // Any status is retried, 4xx included
            FetchError::Status { .. } => true,
            FetchError::Network(_) => true,
            FetchError::Timeout(_) => true,
            FetchError::Io(_) => true,
            FetchError::Other(_) => true,
            // Cannot become valid by waiting
            FetchError::InvalidLocator { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_retryable(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Execute an async operation with bounded retries
///
/// Stops at the first success. After a failed attempt, sleeps for the current
/// backoff unless that attempt was the last one allowed. When no attempt
/// succeeds, returns [`Error::RetryExhausted`] with the number of attempts made
/// and the last failure message. A non-retryable error ends the loop early with
/// the same error shape.
///
/// `max_attempts` of 0 is treated as 1.
pub async fn attempt<F, Fut, T, E>(policy: &RetryConfig, operation: F) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    attempt_until_cancelled(policy, &CancellationToken::new(), operation).await
}

/// [`attempt`], abandoned once `cancel` fires
///
/// An attempt already running is allowed to finish; if it succeeds its value
/// is returned. After a failed attempt, or during the backoff sleep, a
/// cancelled token ends the loop with [`Error::Cancelled`].
pub async fn attempt_until_cancelled<F, Fut, T, E>(
    policy: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.backoff.min(policy.max_delay);
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        attempts += 1;

        let (message, retryable) =
            match tokio::time::timeout(policy.attempt_timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempts > 1 {
                        tracing::info!(attempts, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => (e.to_string(), e.is_retryable()),
                Err(_) => (
                    FetchError::Timeout(policy.attempt_timeout).to_string(),
                    true,
                ),
            };

        if !retryable {
            tracing::error!(error = %message, attempts, "Operation failed with non-retryable error");
            return Err(Error::RetryExhausted {
                attempts,
                last_error: message,
            });
        }

        if attempts >= max_attempts {
            tracing::warn!(
                error = %message,
                attempts,
                "Operation failed after all retry attempts exhausted"
            );
            return Err(Error::RetryExhausted {
                attempts,
                last_error: message,
            });
        }

        if cancel.is_cancelled() {
            tracing::debug!(error = %message, attempts, "Retry abandoned, run cancelled");
            return Err(Error::Cancelled);
        }

        let wait = if policy.jitter {
            add_jitter(delay)
        } else {
            delay
        };

        tracing::warn!(
            error = %message,
            attempt = attempts,
            max_attempts,
            delay_ms = wait.as_millis(),
            "Operation failed, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                tracing::debug!(attempts, "Retry backoff interrupted, run cancelled");
                return Err(Error::Cancelled);
            }
        }

        let scaled = delay.as_secs_f64() * policy.backoff_multiplier.max(0.0);
        delay = Duration::try_from_secs_f64(scaled)
            .unwrap_or(policy.max_delay)
            .min(policy.max_delay);
    }
}

/// Add random jitter to a delay, between `delay` and `2 * delay`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
