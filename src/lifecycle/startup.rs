//! Startup orchestration.
//!
//! Subsystems come up in dependency order: ledger, wallet, chat, bridge,
//! balance poller, then the HTTP listener. A ledger that fails to
//! initialize leaves the process running in a degraded mode: chat still
//! connects, writes answer 503.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::blockchain::{ExternalWallet, Ledger, LedgerService};
use crate::bridge::{BalancePoller, Bridge, Feed};
use crate::chat::ChatService;
use crate::config::BridgeConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid contract address '{0}'")]
    InvalidContractAddress(String),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Start every subsystem and run until Ctrl+C.
pub async fn run(config: BridgeConfig) -> Result<(), StartupError> {
    let contract: Address = config
        .blockchain
        .contract_address
        .parse()
        .map_err(|_| StartupError::InvalidContractAddress(config.blockchain.contract_address.clone()))?;

    let ledger: Option<Arc<dyn Ledger>> = match LedgerService::initialize(&config.blockchain).await {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            tracing::error!(error = %e, "Ledger unavailable, continuing without on-chain writes");
            None
        }
    };

    let wallet = Arc::new(ExternalWallet::from_config(&config.wallet, &config.blockchain, contract));
    let chat = ChatService::twitch(&config.chat);
    let feed = Feed::from_config(&config.feed);
    let shutdown = Shutdown::new();

    if let Some(ledger) = &ledger {
        Bridge::new(chat.clone(), ledger.clone(), feed.clone(), &config.feed).attach();

        let poller = BalancePoller::new(
            ledger.clone(),
            feed.clone(),
            Duration::from_secs(config.feed.balance_poll_secs),
        );
        tokio::spawn(poller.run(shutdown.subscribe()));
    }

    if config.chat.channel.trim().is_empty() {
        tracing::info!("No channel configured, waiting for a channel change");
    } else if let Err(e) = chat.initialize(&config.chat.channel).await {
        tracing::error!(channel = %config.chat.channel, error = %e, "Initial chat connection failed");
    }

    let listener = TcpListener::bind(&config.http.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.http.bind_address.clone(),
            source,
        })?;

    let state = AppState {
        chat: chat.clone(),
        ledger,
        wallet,
        feed,
        explorer_url: config.blockchain.explorer_url.clone(),
    };
    let server = HttpServer::new(&config.http, state);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();
    chat.disconnect().await;

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
