//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the stream ledger bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Chat ingestion settings (endpoint, channel, retry policy).
    pub chat: ChatConfig,

    /// Ledger node and contract settings.
    pub blockchain: BlockchainConfig,

    /// External (EIP-1193) wallet settings for donations.
    pub wallet: WalletConfig,

    /// Feed and balance polling settings.
    pub feed: FeedConfig,

    /// JSON API settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chat ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// IRC-over-WebSocket endpoint.
    pub endpoint: String,

    /// Channel joined at startup. Empty means "wait for a channel change".
    pub channel: String,

    /// Login nick. Anonymous (`justinfan…`) when unset.
    pub nick: Option<String>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Bounded wait when tearing down an existing connection.
    pub teardown_timeout_secs: u64,

    /// Bounded wait for a part/join channel switch.
    pub channel_switch_timeout_secs: u64,

    /// Reconnect policy.
    pub retry: RetryConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://irc-ws.chat.twitch.tv:443".to_string(),
            channel: String::new(),
            nick: None,
            connect_timeout_secs: 30,
            teardown_timeout_secs: 5,
            channel_switch_timeout_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts beyond the first.
    pub max_retries: u32,

    /// Base delay in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single exponential delay in milliseconds.
    pub max_delay_ms: u64,

    /// Jitter as a fraction of the delay (0.0 disables jitter).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            jitter_ratio: 0.0,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (10143 for Monad testnet).
    pub chain_id: u64,

    /// Human readable network name, used when registering the network
    /// with an external wallet.
    pub network_name: String,

    /// Native currency symbol.
    pub currency_symbol: String,

    /// Address of the stream ledger contract.
    pub contract_address: String,

    /// Block explorer base URL (`{explorer_url}/tx/{hash}`).
    pub explorer_url: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Maximum time to wait for a receipt in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_ms: u64,

    /// Private key for the service's own submissions.
    /// Never read from the config file; see `loader::apply_env`.
    #[serde(skip)]
    pub private_key: Option<String>,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://testnet-rpc.monad.xyz".to_string(),
            failover_urls: Vec::new(),
            chain_id: 10143,
            network_name: "Monad Testnet".to_string(),
            currency_symbol: "MON".to_string(),
            contract_address: String::new(),
            explorer_url: "https://testnet.monadexplorer.com".to_string(),
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            receipt_poll_ms: 1000,
            private_key: None,
        }
    }
}

/// External wallet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// EIP-1193 JSON-RPC endpoint of the user's wallet. `None` means no
    /// wallet is installed.
    pub endpoint: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Multiplier applied to the node's gas price for donations.
    pub gas_price_multiplier: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: 60,
            gas_price_multiplier: 2,
        }
    }
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Mirror incoming chat messages as on-chain comments.
    pub mirror_comments: bool,

    /// Balance polling interval in seconds.
    pub balance_poll_secs: u64,

    /// Contract balance (in ether) under which the gas fund is reported low.
    pub minimum_gas_fund: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mirror_comments: true,
            balance_poll_secs: 10,
            minimum_gas_fund: 0.1,
        }
    }
}

/// JSON API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Request timeout in seconds. Covers the wait for on-chain receipts.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 180,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
