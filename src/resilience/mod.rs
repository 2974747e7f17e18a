//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connect attempt:
//!     → timeouts.rs (every external call has a deadline)
//!     → On failure: retries.rs (classified error, bounded attempts)
//!     → backoff.rs (delay chosen by failure kind)
//! ```
//!
//! # Design Decisions
//! - Failures are classified where they happen, never by message text
//! - Retry ceiling is a small fixed count; exhaustion is a typed error
//! - Timeouts race the operation against a timer; the loser is dropped

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{BackoffPolicy, ConnectErrorKind};
pub use retries::{retry_with_backoff, RetryError, Retryable};
pub use timeouts::{with_deadline, DeadlineElapsed};
