//! Transaction building, broadcast, and confirmation monitoring.
//!
//! # Responsibilities
//! - Build contract calls with gas price and gas limit filled in
//! - Reserve the nonce as late as possible, right before broadcast
//! - Wait for the receipt and report reverts

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::nonce::NonceCounter;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};
use crate::blockchain::wallet::Wallet;

/// Transaction builder for the service wallet.
#[derive(Clone)]
pub struct TxBuilder {
    client: BlockchainClient,
    wallet: Wallet,
    nonce: Arc<NonceCounter>,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(client: BlockchainClient, wallet: Wallet, nonce: Arc<NonceCounter>) -> Self {
        Self {
            client,
            wallet,
            nonce,
        }
    }

    /// Build a transaction request and reserve its nonce.
    ///
    /// # Arguments
    /// * `to` - Destination address
    /// * `value` - Amount of native token to send
    /// * `data` - Call data (empty for simple transfers)
    pub async fn build(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> BlockchainResult<TransactionRequest> {
        let from = self.wallet.address();
        let gas_price = self.client.get_gas_price().await?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data)
            .with_gas_price(gas_price)
            .with_chain_id(self.wallet.chain_id());

        let gas_limit = self.client.estimate_gas(tx.clone()).await?;

        // Resync with the node and take the next slot in one step.
        let remote = self.client.get_transaction_count(from).await?;
        let nonce = self.nonce.reserve(remote);
        tracing::debug!(nonce, remote, gas_limit, "Nonce reserved");

        Ok(tx.with_gas_limit(gas_limit).with_nonce(nonce))
    }

    /// Build, broadcast, and wait for a receipt.
    pub async fn send(&self, to: Address, data: Bytes, timeout_secs: u64, poll: Duration) -> BlockchainResult<TxHash> {
        let tx = self.build(to, U256::ZERO, data).await?;
        let tx_hash = self.client.send_transaction(tx).await?;
        tracing::debug!(tx_hash = %tx_hash, "Transaction broadcast");

        match wait_for_confirmation(&self.client, tx_hash, timeout_secs, poll).await? {
            ConfirmationStatus::Confirmed { block_number } => {
                tracing::debug!(tx_hash = %tx_hash, block_number, "Transaction confirmed");
                Ok(tx_hash)
            }
            ConfirmationStatus::Failed(reason) => Err(BlockchainError::Reverted(reason)),
        }
    }

    /// Get the wallet address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Local nonce counter shared with the service.
    pub fn nonce(&self) -> &NonceCounter {
        &self.nonce
    }
}

/// Wait for a transaction to be mined.
///
/// # Arguments
/// * `tx_hash` - Transaction hash to monitor
/// * `timeout_secs` - Maximum time to wait for the receipt
/// * `poll_interval` - Delay between receipt queries
pub async fn wait_for_confirmation(
    client: &BlockchainClient,
    tx_hash: TxHash,
    timeout_secs: u64,
    poll_interval: Duration,
) -> BlockchainResult<ConfirmationStatus> {
    let timeout_duration = Duration::from_secs(timeout_secs);

    let result = timeout(timeout_duration, async {
        let mut ticker = interval(poll_interval);

        loop {
            ticker.tick().await;

            let receipt = match client.get_transaction_receipt(tx_hash).await? {
                Some(r) => r,
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    continue;
                }
            };

            if !receipt.status() {
                return Ok(ConfirmationStatus::Failed(
                    "Transaction reverted".to_string(),
                ));
            }

            return Ok(ConfirmationStatus::Confirmed {
                block_number: receipt.block_number.unwrap_or_default(),
            });
        }
    })
    .await;

    match result {
        Ok(status) => status,
        Err(_) => Err(BlockchainError::ConfirmationTimeout(timeout_secs)),
    }
}
