//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Ledger → Wallet → Chat → Bridge → Poller → HTTP listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → poller and server stop → chat disconnect
//!
//! Signals (signals.rs):
//!     SIGINT → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
