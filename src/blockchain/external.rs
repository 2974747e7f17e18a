//! External wallet reached through EIP-1193 requests.
//!
//! Donations are signed by the end user's wallet, not the service key.
//! Before sending, the wallet is switched to the configured network,
//! registering the network first if the wallet reports it unknown (4902).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::blockchain::types::{BlockchainConfig, ChainId, TxReference};
use crate::config::WalletConfig;
use crate::observability::metrics;
use crate::resilience::{with_deadline, DeadlineElapsed};

/// Error code returned by wallets for an unknown chain.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// Errors from the external wallet.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("No external wallet installed")]
    NotInstalled,

    #[error("Wallet RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Wallet transport error: {0}")]
    Transport(String),

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("Unexpected wallet response: {0}")]
    InvalidResponse(String),

    #[error("Donation reverted")]
    Reverted,

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),
}

pub type WalletResult<T> = Result<T, WalletError>;

/// EIP-1193 `request({ method, params })`.
#[async_trait]
pub trait Eip1193: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> WalletResult<Value>;
}

/// EIP-1193 over HTTP JSON-RPC. Every request is bounded by `timeout`.
#[derive(Debug)]
pub struct HttpEip1193 {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpEip1193 {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, body: &Value) -> WalletResult<Value> {
        self.client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Eip1193 for HttpEip1193 {
    async fn request(&self, method: &str, params: Value) -> WalletResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = with_deadline("wallet request", self.timeout, self.call(&body)).await??;

        if let Some(error) = response.get("error") {
            return Err(WalletError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// Network definition handed to `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDefinition {
    pub chain_id: ChainId,
    pub name: String,
    pub currency_symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl NetworkDefinition {
    pub fn from_config(config: &BlockchainConfig) -> Self {
        Self {
            chain_id: ChainId(config.chain_id),
            name: config.network_name.clone(),
            currency_symbol: config.currency_symbol.clone(),
            rpc_url: config.rpc_url.clone(),
            explorer_url: config.explorer_url.clone(),
        }
    }

    fn add_params(&self) -> Value {
        json!([{
            "chainId": self.chain_id.to_hex(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.currency_symbol,
                "symbol": self.currency_symbol,
                "decimals": 18
            },
            "rpcUrls": [self.rpc_url],
            "blockExplorerUrls": [self.explorer_url]
        }])
    }
}

/// The user's wallet, if one is installed.
pub struct ExternalWallet {
    provider: Option<Arc<dyn Eip1193>>,
    network: NetworkDefinition,
    contract: Address,
    gas_price_multiplier: u64,
    request_timeout: Duration,
    receipt_poll: Duration,
}

impl ExternalWallet {
    pub fn new(
        provider: Option<Arc<dyn Eip1193>>,
        network: NetworkDefinition,
        contract: Address,
        wallet_config: &WalletConfig,
        receipt_poll: Duration,
    ) -> Self {
        Self {
            provider,
            network,
            contract,
            gas_price_multiplier: wallet_config.gas_price_multiplier,
            request_timeout: Duration::from_secs(wallet_config.request_timeout_secs),
            receipt_poll,
        }
    }

    /// Wallet reached over HTTP when `wallet.endpoint` is configured.
    pub fn from_config(
        wallet_config: &WalletConfig,
        chain: &BlockchainConfig,
        contract: Address,
    ) -> Self {
        let timeout = Duration::from_secs(wallet_config.request_timeout_secs);
        let provider = wallet_config
            .endpoint
            .as_ref()
            .map(|endpoint| Arc::new(HttpEip1193::new(endpoint.clone(), timeout)) as Arc<dyn Eip1193>);
        Self::new(
            provider,
            NetworkDefinition::from_config(chain),
            contract,
            wallet_config,
            Duration::from_millis(chain.receipt_poll_ms.max(1)),
        )
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> WalletResult<&Arc<dyn Eip1193>> {
        self.provider.as_ref().ok_or(WalletError::NotInstalled)
    }

    /// Switch to the configured network, registering it if unknown.
    pub async fn ensure_network(&self) -> WalletResult<()> {
        let provider = self.provider()?;
        let switch_params = json!([{ "chainId": self.network.chain_id.to_hex() }]);

        match provider.request("wallet_switchEthereumChain", switch_params.clone()).await {
            Ok(_) => Ok(()),
            Err(WalletError::Rpc { code: UNRECOGNIZED_CHAIN, .. }) => {
                self.add_network(provider.as_ref()).await;
                provider.request("wallet_switchEthereumChain", switch_params).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn add_network(&self, provider: &dyn Eip1193) {
        tracing::info!(chain_id = %self.network.chain_id.to_hex(), name = %self.network.name, "Registering network with wallet");
        if let Err(e) = provider
            .request("wallet_addEthereumChain", self.network.add_params())
            .await
        {
            tracing::error!(error = %e, "Error adding network to wallet");
        }
    }

    async fn request_accounts(&self) -> WalletResult<Vec<String>> {
        let accounts = self.provider()?.request("eth_requestAccounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(accounts)
            .map_err(|e| WalletError::InvalidResponse(e.to_string()))?;
        if accounts.is_empty() {
            return Err(WalletError::NoAccounts);
        }
        Ok(accounts)
    }

    /// Request account access and select the network.
    pub async fn try_connect(&self) -> WalletResult<String> {
        let accounts = self.request_accounts().await?;
        self.ensure_network().await?;
        Ok(accounts[0].clone())
    }

    /// Connected account, or `None` on any failure.
    pub async fn connect(&self) -> Option<String> {
        match self.try_connect().await {
            Ok(account) => {
                tracing::info!(account = %account, "Wallet connected");
                Some(account)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error connecting wallet");
                None
            }
        }
    }

    /// Send `amount` (in ether) from the user's wallet to the contract.
    pub async fn try_donate(&self, amount: &str) -> WalletResult<TxReference> {
        let provider = self.provider()?;
        let value = parse_ether(amount.trim()).map_err(|_| WalletError::InvalidAmount(amount.to_string()))?;
        if value.is_zero() {
            return Err(WalletError::InvalidAmount(amount.to_string()));
        }

        self.ensure_network().await?;
        let accounts = self.request_accounts().await?;

        let gas_price = parse_quantity(&provider.request("eth_gasPrice", json!([])).await?)?;
        let gas_price = gas_price.saturating_mul(U256::from(self.gas_price_multiplier));

        let tx = json!([{
            "from": accounts[0],
            "to": self.contract.to_string(),
            "value": format!("{:#x}", value),
            "gasPrice": format!("{:#x}", gas_price),
        }]);
        let hash = provider.request("eth_sendTransaction", tx).await?;
        let hash: TxHash = hash
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| WalletError::InvalidResponse(format!("transaction hash {hash}")))?;

        tracing::info!(tx_hash = %hash, amount = %amount, "Donation sent, waiting for receipt");
        with_deadline("donation receipt", self.request_timeout, self.wait_for_receipt(provider.as_ref(), hash)).await??;
        Ok(TxReference(hash))
    }

    /// Donation reference, or `None` on any failure.
    pub async fn donate(&self, amount: &str) -> Option<TxReference> {
        match self.try_donate(amount).await {
            Ok(reference) => {
                metrics::record_submission("donation", true);
                Some(reference)
            }
            Err(e) => {
                metrics::record_submission("donation", false);
                tracing::error!(error = %e, "Error donating");
                None
            }
        }
    }

    async fn wait_for_receipt(&self, provider: &dyn Eip1193, hash: TxHash) -> WalletResult<()> {
        let mut ticker = tokio::time::interval(self.receipt_poll);
        loop {
            ticker.tick().await;
            let receipt = provider
                .request("eth_getTransactionReceipt", json!([hash.to_string()]))
                .await?;
            if receipt.is_null() {
                continue;
            }
            return match receipt.get("status").and_then(Value::as_str) {
                Some("0x0") => Err(WalletError::Reverted),
                _ => Ok(()),
            };
        }
    }
}

fn parse_quantity(value: &Value) -> WalletResult<U256> {
    value
        .as_str()
        .and_then(|s| U256::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| WalletError::InvalidResponse(format!("quantity {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted wallet: answers by method, records every request.
    #[derive(Default)]
    struct MockWallet {
        calls: Mutex<Vec<(String, Value)>>,
        switch_results: Mutex<VecDeque<WalletResult<Value>>>,
    }

    #[async_trait]
    impl Eip1193 for MockWallet {
        async fn request(&self, method: &str, params: Value) -> WalletResult<Value> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            match method {
                "wallet_switchEthereumChain" => self
                    .switch_results
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(Ok(Value::Null)),
                "wallet_addEthereumChain" => Ok(Value::Null),
                "eth_requestAccounts" => Ok(json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"])),
                "eth_gasPrice" => Ok(json!("0x3b9aca00")),
                "eth_sendTransaction" => Ok(json!(format!("0x{}", "11".repeat(32)))),
                "eth_getTransactionReceipt" => Ok(json!({ "status": "0x1" })),
                other => Err(WalletError::Rpc {
                    code: -32601,
                    message: format!("method {other} not found"),
                }),
            }
        }
    }

    impl MockWallet {
        fn methods(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }

        fn params_of(&self, method: &str) -> Value {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .unwrap()
        }
    }

    fn wallet(mock: Option<Arc<MockWallet>>) -> ExternalWallet {
        let chain = BlockchainConfig::default();
        ExternalWallet::new(
            mock.map(|m| m as Arc<dyn Eip1193>),
            NetworkDefinition::from_config(&chain),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(),
            &WalletConfig::default(),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_not_installed_fails_immediately() {
        let wallet = wallet(None);
        assert!(!wallet.is_installed());
        assert!(matches!(wallet.try_donate("1").await, Err(WalletError::NotInstalled)));
        assert!(wallet.connect().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_chain_is_registered_then_switched() {
        let mock = Arc::new(MockWallet::default());
        mock.switch_results.lock().unwrap().push_back(Err(WalletError::Rpc {
            code: UNRECOGNIZED_CHAIN,
            message: "Unrecognized chain ID".into(),
        }));
        let wallet = wallet(Some(mock.clone()));

        wallet.ensure_network().await.unwrap();

        assert_eq!(
            mock.methods(),
            vec!["wallet_switchEthereumChain", "wallet_addEthereumChain", "wallet_switchEthereumChain"]
        );
        let added = mock.params_of("wallet_addEthereumChain");
        assert_eq!(added[0]["chainId"], "0x279F");
        assert_eq!(added[0]["chainName"], "Monad Testnet");
        assert_eq!(added[0]["nativeCurrency"]["decimals"], 18);
    }

    #[tokio::test]
    async fn test_other_switch_errors_propagate() {
        let mock = Arc::new(MockWallet::default());
        mock.switch_results.lock().unwrap().push_back(Err(WalletError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
        }));
        let wallet = wallet(Some(mock.clone()));

        assert!(matches!(wallet.ensure_network().await, Err(WalletError::Rpc { code: 4001, .. })));
        assert_eq!(mock.methods(), vec!["wallet_switchEthereumChain"]);
    }

    #[tokio::test]
    async fn test_connect_returns_first_account() {
        let mock = Arc::new(MockWallet::default());
        let wallet = wallet(Some(mock.clone()));
        assert_eq!(
            wallet.connect().await.as_deref(),
            Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        assert_eq!(mock.methods(), vec!["eth_requestAccounts", "wallet_switchEthereumChain"]);
    }

    #[tokio::test]
    async fn test_donation_doubles_gas_price() {
        let mock = Arc::new(MockWallet::default());
        let wallet = wallet(Some(mock.clone()));

        let reference = wallet.donate("0.5").await.unwrap();

        assert_eq!(reference.to_string(), format!("0x{}", "11".repeat(32)));
        let tx = mock.params_of("eth_sendTransaction");
        assert_eq!(tx[0]["value"], "0x6f05b59d3b20000");
        assert_eq!(tx[0]["gasPrice"], "0x77359400");
        assert_eq!(
            tx[0]["to"].as_str().unwrap().to_lowercase(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[tokio::test]
    async fn test_unresponsive_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let wallet_config = WalletConfig {
            endpoint: Some(format!("http://{addr}")),
            request_timeout_secs: 1,
            ..WalletConfig::default()
        };
        let wallet = ExternalWallet::from_config(
            &wallet_config,
            &BlockchainConfig::default(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(5), wallet.try_connect())
            .await
            .expect("wallet request was not bounded");
        assert!(matches!(outcome, Err(WalletError::Timeout(_))));
        assert!(
            tokio::time::timeout(Duration::from_secs(5), wallet.connect())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected() {
        let mock = Arc::new(MockWallet::default());
        let wallet = wallet(Some(mock.clone()));
        assert!(matches!(wallet.try_donate("lots").await, Err(WalletError::InvalidAmount(_))));
        assert!(matches!(wallet.try_donate("0").await, Err(WalletError::InvalidAmount(_))));
        assert!(mock.methods().is_empty());
    }
}
