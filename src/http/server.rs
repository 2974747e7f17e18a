//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown signal fires

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::blockchain::{ExternalWallet, Ledger};
use crate::bridge::Feed;
use crate::chat::ChatService;
use crate::config::HttpConfig;
use crate::http::handlers::*;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    /// `None` when the ledger failed to initialize; writes answer 503.
    pub ledger: Option<Arc<dyn Ledger>>,
    pub wallet: Arc<ExternalWallet>,
    pub feed: Feed,
    pub explorer_url: String,
}

/// JSON API server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &HttpConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    #[allow(deprecated)]
    fn build_router(config: &HttpConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(get_health))
            .route("/feed", get(get_feed))
            .route("/pending", get(get_pending))
            .route("/balance", get(get_balance))
            .route("/channel", get(get_channel).post(post_channel))
            .route("/reactions", post(post_reaction))
            .route("/moments", post(post_moment))
            .route("/donations", post(post_donation))
            .route("/wallet/connect", post(post_wallet_connect))
            .route("/tx/{reference}", get(get_tx_url))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
