//! Ledger submission service.
//!
//! Owns the node connection, the service signing key and the nonce
//! counter. Writes return `None` on failure; balance reads return `"0"`.

use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::contract::Submission;
use crate::blockchain::nonce::NonceCounter;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{
    format_ether, tx_url, BlockchainConfig, BlockchainError, BlockchainResult, TxReference,
};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

/// Write and read operations the bridge and the HTTP API depend on.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn post_comment(&self, username: &str, message: &str) -> Option<TxReference>;
    async fn post_reaction(&self, reaction: &str, streamer: &str) -> Option<TxReference>;
    async fn mint_moment(&self, metadata: &str, streamer: &str) -> Option<TxReference>;
    async fn query_balance(&self) -> String;
}

/// Transaction submission service for the stream ledger contract.
pub struct LedgerService {
    client: BlockchainClient,
    builder: TxBuilder,
    contract: Address,
    explorer_url: String,
    confirmation_timeout_secs: u64,
    receipt_poll: Duration,
}

impl LedgerService {
    /// Connect to the node, check the contract is deployed, and seed the
    /// nonce counter from the account's transaction count.
    pub async fn initialize(config: &BlockchainConfig) -> BlockchainResult<Self> {
        let private_key = config.private_key.as_deref().ok_or_else(|| {
            BlockchainError::Wallet(format!(
                "Environment variable {} not set",
                crate::config::loader::PRIVATE_KEY_ENV_VAR
            ))
        })?;
        let wallet = Wallet::from_private_key(private_key, config.chain_id)?;
        let contract: Address = config
            .contract_address
            .parse()
            .map_err(|_| BlockchainError::InvalidAddress(config.contract_address.clone()))?;

        let client = BlockchainClient::new(config.clone(), Some(&wallet))?;
        match client.verify_chain_id().await {
            Ok(()) => {}
            Err(BlockchainError::ChainMismatch { expected, actual }) => {
                tracing::warn!(expected, actual, "Node reports a different chain id");
            }
            Err(e) => return Err(e),
        }

        let code = client.get_code(contract).await?;
        if code.is_empty() {
            tracing::error!(contract = %contract, "Contract not found at specified address");
            return Err(BlockchainError::ContractNotFound(contract.to_string()));
        }

        let remote = client.get_transaction_count(wallet.address()).await?;
        let nonce = Arc::new(NonceCounter::new(remote));

        tracing::info!(
            contract = %contract,
            account = %wallet.address(),
            nonce = remote,
            "Ledger service initialized"
        );

        Ok(Self {
            builder: TxBuilder::new(client.clone(), wallet, nonce),
            client,
            contract,
            explorer_url: config.explorer_url.clone(),
            confirmation_timeout_secs: config.confirmation_timeout_secs,
            receipt_poll: Duration::from_millis(config.receipt_poll_ms.max(1)),
        })
    }

    /// Submit a write and wait for its receipt.
    pub async fn try_submit(&self, submission: &Submission) -> BlockchainResult<TxReference> {
        let tx_hash = self
            .builder
            .send(
                self.contract,
                submission.calldata(),
                self.confirmation_timeout_secs,
                self.receipt_poll,
            )
            .await?;
        Ok(TxReference(tx_hash))
    }

    /// Submit a write; failures are logged and reported as `None`.
    pub async fn submit(&self, submission: Submission) -> Option<TxReference> {
        let kind = submission.kind();
        match self.try_submit(&submission).await {
            Ok(reference) => {
                metrics::record_submission(kind, true);
                tracing::info!(kind, tx = %reference, "Submission confirmed");
                Some(reference)
            }
            Err(e) => {
                metrics::record_submission(kind, false);
                tracing::error!(kind, error = %e, "Error posting {}", kind);
                None
            }
        }
    }

    pub async fn post_comment(&self, username: &str, message: &str) -> Option<TxReference> {
        self.submit(Submission::Comment {
            username: username.to_string(),
            message: message.to_string(),
        })
        .await
    }

    pub async fn post_reaction(&self, reaction: &str, streamer: &str) -> Option<TxReference> {
        self.submit(Submission::Reaction {
            reaction: reaction.to_string(),
            streamer: streamer.to_string(),
        })
        .await
    }

    pub async fn mint_moment(&self, metadata: &str, streamer: &str) -> Option<TxReference> {
        self.submit(Submission::Moment {
            metadata: metadata.to_string(),
            streamer: streamer.to_string(),
        })
        .await
    }

    /// Contract balance in ether (`"0"` if the query fails).
    pub async fn query_balance(&self) -> String {
        match self.client.get_balance(self.contract).await {
            Ok(wei) => format_ether(wei),
            Err(e) => {
                tracing::error!(error = %e, "Error checking balance");
                "0".to_string()
            }
        }
    }

    /// Explorer link for a transaction reference.
    pub fn tx_url(&self, reference: &str) -> String {
        tx_url(&self.explorer_url, reference)
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn account(&self) -> Address {
        self.builder.address()
    }

    /// Next nonce the service would use, ignoring the node.
    pub fn local_nonce(&self) -> u64 {
        self.builder.nonce().current()
    }

    pub async fn is_healthy(&self) -> bool {
        self.client.is_healthy().await
    }
}

#[async_trait]
impl Ledger for LedgerService {
    async fn post_comment(&self, username: &str, message: &str) -> Option<TxReference> {
        LedgerService::post_comment(self, username, message).await
    }

    async fn post_reaction(&self, reaction: &str, streamer: &str) -> Option<TxReference> {
        LedgerService::post_reaction(self, reaction, streamer).await
    }

    async fn mint_moment(&self, metadata: &str, streamer: &str) -> Option<TxReference> {
        LedgerService::mint_moment(self, metadata, streamer).await
    }

    async fn query_balance(&self) -> String {
        LedgerService::query_balance(self).await
    }
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("contract", &self.contract)
            .field("account", &self.builder.address())
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_private_key() {
        let config = BlockchainConfig {
            contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            ..BlockchainConfig::default()
        };
        let err = LedgerService::initialize(&config).await.unwrap_err();
        assert!(err.to_string().contains("STREAM_LEDGER_PRIVATE_KEY"));
    }

    #[tokio::test]
    async fn test_invalid_contract_address() {
        let config = BlockchainConfig {
            contract_address: "0x1234".to_string(),
            private_key: Some(
                "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            ..BlockchainConfig::default()
        };
        let err = LedgerService::initialize(&config).await.unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidAddress(_)));
    }
}
