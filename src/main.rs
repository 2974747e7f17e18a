//! Stream ledger bridge.
//!
//! # Architecture Overview
//!
//! ```text
//!   Twitch IRC (wss)                                   EVM node (JSON-RPC)
//!        │                                                   ▲
//!        ▼                                                   │
//!  ┌───────────┐   handler   ┌──────────┐  post_comment  ┌────────────┐
//!  │   chat    │────────────▶│  bridge  │───────────────▶│ blockchain │
//!  │  service  │             │   feed   │◀───────────────│  service   │
//!  └───────────┘             └──────────┘  query_balance └────────────┘
//!        ▲                         ▲                            ▲
//!        │ change_channel          │ feed / pending / balance   │ react / mint
//!  ┌─────┴─────────────────────────┴────────────────────────────┴─────┐
//!  │                         http (JSON API)                          │
//!  └──────────────────────────────────────────────────────────────────┘
//!                                  ▲
//!                              stream-cli
//! ```

use std::path::PathBuf;

use clap::Parser;
use stream_ledger::config::loader::load_or_default;
use stream_ledger::lifecycle;
use stream_ledger::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "stream-ledger")]
#[command(about = "Mirror Twitch chat onto an EVM contract", long_about = None)]
struct Args {
    /// Path to the TOML configuration file (optional).
    #[arg(short, long, default_value = "stream-ledger.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stream-ledger starting");
    tracing::info!(
        channel = %config.chat.channel,
        rpc_url = %config.blockchain.rpc_url,
        contract = %config.blockchain.contract_address,
        bind_address = %config.http.bind_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    lifecycle::run(config).await?;
    Ok(())
}
