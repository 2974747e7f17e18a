//! Stream ledger bridge library.
//!
//! Mirrors a Twitch chat channel onto an EVM contract: chat messages
//! become on-chain comments, and reactions, moments and donations are
//! submitted on request.

pub mod blockchain;
pub mod bridge;
pub mod chat;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use blockchain::{ExternalWallet, Ledger, LedgerService};
pub use bridge::{Bridge, Feed};
pub use chat::ChatService;
pub use config::BridgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
