//! Retry logic.
//!
//! # Responsibilities
//! - Decide from a tagged error whether an attempt may be repeated
//! - Sleep according to [`BackoffPolicy`] between attempts
//! - Stop after the first attempt plus `max_retries` retries

use std::future::Future;

use crate::resilience::backoff::{BackoffPolicy, ConnectErrorKind};

/// An error that knows whether (and how) it may be retried.
pub trait Retryable {
    /// `None` for errors that must not be retried.
    fn retry_kind(&self) -> Option<ConnectErrorKind>;
}

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was not retryable; no further attempts were made.
    NotRetryable(E),
    /// Every permitted attempt failed.
    Exhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        kind: ConnectErrorKind,
        last: E,
    },
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry ceiling is reached. `op` receives the 0-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    max_retries: u32,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some(kind) = error.retry_kind() else {
            return Err(RetryError::NotRetryable(error));
        };

        if attempt >= max_retries {
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                kind,
                last: error,
            });
        }

        attempt += 1;
        let delay = policy.delay_for(kind, attempt);
        tracing::warn!(
            error = %error,
            kind = %kind,
            attempt = attempt,
            max_retries = max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying connection"
        );
        tokio::time::sleep(delay).await;
    }
}
