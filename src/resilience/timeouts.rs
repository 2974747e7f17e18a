//! Timeout enforcement.
//!
//! Wraps a future in `tokio::time::timeout` and names what timed out.

use std::future::Future;
use std::time::Duration;

/// A labelled deadline that elapsed before its operation completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineElapsed {
    pub operation: &'static str,
    pub after: Duration,
}

impl std::fmt::Display for DeadlineElapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} timed out after {:?}", self.operation, self.after)
    }
}

impl std::error::Error for DeadlineElapsed {}

/// Race `fut` against a timer. On timeout the future is dropped.
pub async fn with_deadline<F: Future>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<F::Output, DeadlineElapsed> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| DeadlineElapsed { operation, after })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let err = with_deadline("teardown", Duration::from_secs(5), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.operation, "teardown");
        assert_eq!(err.to_string(), "teardown timed out after 5s");
    }

    #[tokio::test]
    async fn test_completes_in_time() {
        let value = with_deadline("noop", Duration::from_secs(1), async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
