//! Backoff delays chosen by failure kind.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Classification of a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectErrorKind {
    /// Host name could not be resolved.
    Dns,
    /// Peer closed the connection before the session was established.
    ConnectionClosed,
    /// Anything else (refused, TLS, protocol, timeout).
    Generic,
}

impl std::fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectErrorKind::Dns => "name resolution failure",
            ConnectErrorKind::ConnectionClosed => "connection closed",
            ConnectErrorKind::Generic => "connection error",
        };
        f.write_str(name)
    }
}

/// Delay policy for connection retries.
///
/// - `Dns`: fixed `base`
/// - `ConnectionClosed`: fixed `2 × base`
/// - `Generic`: `base × 2^(attempt-1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter_ratio: 0.0,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// Base delay, also used before reconnecting after an unexpected drop.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, kind: ConnectErrorKind, attempt: u32) -> Duration {
        let delay = match kind {
            ConnectErrorKind::Dns => self.base,
            ConnectErrorKind::ConnectionClosed => self.base.saturating_mul(2),
            ConnectErrorKind::Generic => {
                calculate_backoff(attempt, self.base.as_millis() as u64, self.max.as_millis() as u64)
            }
        };
        self.with_jitter(delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        let jitter_range = (delay.as_millis() as f64 * self.jitter_ratio) as u64;
        if jitter_range == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_range))
    }
}

/// Calculate exponential backoff delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    Duration::from_millis(delay_ms.min(max_ms))
}
