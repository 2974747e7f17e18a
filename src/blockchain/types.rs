//! Chain-specific types and error definitions.

use alloy::primitives::utils::format_units;
use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl ChainId {
    /// Hex form used by wallet RPCs (e.g. `0x279F` for 10143).
    pub fn to_hex(self) -> String {
        format!("0x{:X}", self.0)
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No receipt arrived within the confirmation window.
    #[error("Transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or missing key.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The target address holds no code.
    #[error("Contract not found at {0}")]
    ContractNotFound(String),

    /// Invalid address in configuration.
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Operation needs a component that is not configured.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Outcome of waiting for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction was mined successfully.
    Confirmed { block_number: u64 },
    /// Transaction was mined but reverted.
    Failed(String),
}

/// Opaque reference to a confirmed transaction (its hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxReference(pub TxHash);

impl std::fmt::Display for TxReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block explorer link for a transaction reference.
pub fn tx_url(explorer_url: &str, reference: &str) -> String {
    format!("{explorer_url}/tx/{reference}")
}

/// Format a wei amount in ether, trimming trailing zeros but keeping one
/// decimal digit (`0` → `"0.0"`, `1.5 ether` → `"1.5"`).
pub fn format_ether(wei: U256) -> String {
    let formatted = format_units(wei, "ether").unwrap_or_else(|_| "0.0".to_string());
    let trimmed = formatted.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(10143u64);
        assert_eq!(u64::from(chain_id), 10143);
        assert_eq!(chain_id.to_hex(), "0x279F");
    }

    #[test]
    fn test_default_config() {
        let config = BlockchainConfig::default();
        assert_eq!(config.chain_id, 10143);
        assert_eq!(config.rpc_timeout_secs, 10);
        assert!(config.private_key.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = BlockchainError::ChainMismatch {
            expected: 10143,
            actual: 1,
        };
        assert!(err.to_string().contains("10143"));
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::ZERO), "0.0");
        assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u128)), "1.5");
        assert_eq!(format_ether(U256::from(2_000_000_000_000_000_000u128)), "2.0");
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn test_tx_url_round_trip() {
        let reference = TxReference(TxHash::repeat_byte(0xab));
        let url = tx_url("https://testnet.monadexplorer.com", &reference.to_string());
        assert_eq!(
            url,
            format!("https://testnet.monadexplorer.com/tx/0x{}", "ab".repeat(32))
        );
    }
}
