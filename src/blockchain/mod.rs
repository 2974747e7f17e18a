//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment (private key) + [blockchain] config
//!     → wallet.rs (service signing key)
//!     → client.rs (RPC providers with timeouts and failover)
//!     → nonce.rs (atomic ordering counter)
//!     → transaction.rs (build, sign, broadcast, confirm)
//!     → service.rs (comment / reaction / moment writes, balance)
//!
//! User wallet (EIP-1193)
//!     → external.rs (connect, network switch, donate)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod contract;
pub mod external;
pub mod nonce;
pub mod service;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use contract::Submission;
pub use external::{Eip1193, ExternalWallet, HttpEip1193, NetworkDefinition, WalletError};
pub use nonce::NonceCounter;
pub use service::{Ledger, LedgerService};
pub use types::{
    format_ether, tx_url, BlockchainConfig, BlockchainError, BlockchainResult, ChainId,
    ConfirmationStatus, TxReference,
};
pub use wallet::Wallet;
