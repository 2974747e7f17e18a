use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use alloy::primitives::TxHash;

use crate::blockchain::{tx_url, Ledger, TxReference};
use crate::bridge::ConfirmedEntry;
use crate::chat::{ChatError, ChatMessage};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub channel: Option<String>,
    pub chat_connected: bool,
    pub ledger_available: bool,
    pub wallet_installed: bool,
}

#[derive(Serialize)]
pub struct ChannelStatus {
    pub channel: Option<String>,
    pub connected: bool,
}

#[derive(Serialize)]
pub struct BalanceStatus {
    pub balance: String,
    /// Below `feed.minimum_gas_fund`.
    pub low: bool,
}

/// Result of a write that reached the chain.
#[derive(Serialize)]
pub struct Submitted {
    pub tx_reference: TxReference,
    pub explorer_url: String,
}

#[derive(Serialize)]
pub struct WalletAccount {
    pub account: String,
}

#[derive(Deserialize)]
pub struct ChannelRequest {
    pub channel: String,
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub reaction: String,
}

#[derive(Deserialize)]
pub struct MomentRequest {
    pub metadata: String,
}

#[derive(Deserialize)]
pub struct DonationRequest {
    pub amount: String,
}

/// Error body: `{ "error": "..." }`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn get_health(State(state): State<AppState>) -> Json<SystemStatus> {
    let chat_connected = state.chat.is_connected().await;
    let ledger_available = state.ledger.is_some();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if ledger_available { "operational" } else { "degraded" },
        channel: state.chat.current_channel().await.map(|c| c.to_string()),
        chat_connected,
        ledger_available,
        wallet_installed: state.wallet.is_installed(),
    })
}

pub async fn get_feed(State(state): State<AppState>) -> Json<Vec<ConfirmedEntry>> {
    Json(state.feed.confirmed())
}

pub async fn get_pending(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    Json(state.feed.pending())
}

pub async fn get_balance(State(state): State<AppState>) -> Json<BalanceStatus> {
    Json(BalanceStatus {
        balance: state.feed.balance(),
        low: state.feed.gas_fund_low(),
    })
}

pub async fn get_channel(State(state): State<AppState>) -> Json<ChannelStatus> {
    Json(channel_status(&state).await)
}

pub async fn post_channel(
    State(state): State<AppState>,
    Json(request): Json<ChannelRequest>,
) -> ApiResult<ChannelStatus> {
    match state.chat.change_channel(&request.channel).await {
        Ok(()) => {
            state.feed.clear();
            Ok(Json(channel_status(&state).await))
        }
        Err(e @ ChatError::InvalidChannel(_)) => {
            Err(ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            tracing::error!(channel = %request.channel, error = %e, "Channel change failed");
            Err(ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

pub async fn post_reaction(
    State(state): State<AppState>,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<Submitted> {
    let ledger = ledger(&state)?;
    let streamer = streamer(&state).await?;
    let reference = ledger.post_reaction(&request.reaction, &streamer).await;
    submitted(&state, reference, "Reaction")
}

pub async fn post_moment(
    State(state): State<AppState>,
    Json(request): Json<MomentRequest>,
) -> ApiResult<Submitted> {
    let ledger = ledger(&state)?;
    let streamer = streamer(&state).await?;
    let reference = ledger.mint_moment(&request.metadata, &streamer).await;
    submitted(&state, reference, "Moment")
}

pub async fn post_donation(
    State(state): State<AppState>,
    Json(request): Json<DonationRequest>,
) -> ApiResult<Submitted> {
    if !state.wallet.is_installed() {
        return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "No external wallet installed"));
    }
    let reference = state.wallet.donate(&request.amount).await;
    if reference.is_some() {
        refresh_balance(&state).await;
    }
    submitted(&state, reference, "Donation")
}

pub async fn post_wallet_connect(State(state): State<AppState>) -> ApiResult<WalletAccount> {
    if !state.wallet.is_installed() {
        return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "No external wallet installed"));
    }
    state
        .wallet
        .connect()
        .await
        .map(|account| Json(WalletAccount { account }))
        .ok_or_else(|| ApiError::new(StatusCode::BAD_GATEWAY, "Wallet connection failed"))
}

pub async fn get_tx_url(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Submitted> {
    let hash: TxHash = reference
        .trim()
        .parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid transaction reference '{reference}'")))?;
    let tx_reference = TxReference(hash);
    Ok(Json(Submitted {
        explorer_url: tx_url(&state.explorer_url, &tx_reference.to_string()),
        tx_reference,
    }))
}

async fn refresh_balance(state: &AppState) {
    if let Some(ledger) = &state.ledger {
        state.feed.set_balance(ledger.query_balance().await);
    }
}

async fn channel_status(state: &AppState) -> ChannelStatus {
    ChannelStatus {
        channel: state.chat.current_channel().await.map(|c| c.to_string()),
        connected: state.chat.is_connected().await,
    }
}

fn ledger(state: &AppState) -> Result<&Arc<dyn Ledger>, ApiError> {
    state
        .ledger
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Ledger unavailable"))
}

/// Reactions and moments are attributed to the current channel.
async fn streamer(state: &AppState) -> Result<String, ApiError> {
    state
        .chat
        .current_channel()
        .await
        .map(|c| c.to_string())
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "No channel selected"))
}

fn submitted(state: &AppState, reference: Option<TxReference>, what: &str) -> ApiResult<Submitted> {
    let tx_reference =
        reference.ok_or_else(|| ApiError::new(StatusCode::BAD_GATEWAY, format!("{what} failed")))?;
    Ok(Json(Submitted {
        explorer_url: tx_url(&state.explorer_url, &tx_reference.to_string()),
        tx_reference,
    }))
}
