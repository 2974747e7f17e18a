//! Transaction ordering counter.
//!
//! Before each submission the counter is raised to the node's transaction
//! count if that is higher, and the value is handed out with a
//! post-increment. Both steps happen in one compare-and-swap, so callers
//! racing on the same remote count still get distinct values. The node
//! remains the final arbiter of acceptance.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic nonce counter for one signing account.
#[derive(Debug, Default)]
pub struct NonceCounter {
    next: AtomicU64,
}

impl NonceCounter {
    /// Counter starting at the account's current transaction count.
    pub fn new(remote: u64) -> Self {
        Self {
            next: AtomicU64::new(remote),
        }
    }

    /// Resynchronize to `max(local, remote)` and reserve that value.
    pub fn reserve(&self, remote: u64) -> u64 {
        let previous = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |local| {
                Some(local.max(remote) + 1)
            })
            .unwrap_or_else(|current| current);
        previous.max(remote)
    }

    /// Next value that would be handed out, ignoring the remote count.
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
