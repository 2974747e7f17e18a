//! JSON API and bridge wiring, with the ledger replaced by a double.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use common::{privmsg, start_mock_irc, wait_until, MockIrc, MockLedger, ScriptedWallet, TEST_CONTRACT};
use stream_ledger::blockchain::{Eip1193, ExternalWallet, Ledger, NetworkDefinition};
use stream_ledger::bridge::{Bridge, Feed};
use stream_ledger::chat::ChatService;
use stream_ledger::config::{BlockchainConfig, ChatConfig, FeedConfig, HttpConfig, WalletConfig};
use stream_ledger::http::{AppState, HttpServer};
use stream_ledger::lifecycle::Shutdown;

struct Harness {
    base: String,
    irc: MockIrc,
    ledger: Arc<MockLedger>,
    feed: Feed,
    client: reqwest::Client,
    _shutdown: Shutdown,
}

async fn harness(with_ledger: bool) -> Harness {
    harness_with_wallet(with_ledger, None).await
}

async fn harness_with_wallet(with_ledger: bool, provider: Option<Arc<dyn Eip1193>>) -> Harness {
    let irc = start_mock_irc().await;
    let chat = ChatService::twitch(&ChatConfig {
        endpoint: irc.endpoint(),
        ..ChatConfig::default()
    });
    let ledger = Arc::new(MockLedger::default());
    let feed = Feed::new();
    let contract: Address = TEST_CONTRACT.parse().unwrap();
    let wallet = ExternalWallet::new(
        provider,
        NetworkDefinition::from_config(&BlockchainConfig::default()),
        contract,
        &WalletConfig::default(),
        Duration::from_millis(10),
    );

    if with_ledger {
        Bridge::new(chat.clone(), ledger.clone(), feed.clone(), &FeedConfig::default()).attach();
    }

    let state = AppState {
        chat,
        ledger: with_ledger.then(|| ledger.clone() as Arc<dyn Ledger>),
        wallet: Arc::new(wallet),
        feed: feed.clone(),
        explorer_url: "https://explorer.test".to_string(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&HttpConfig::default(), state);
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    Harness {
        base,
        irc,
        ledger,
        feed,
        client: reqwest::Client::new(),
        _shutdown: shutdown,
    }
}

impl Harness {
    async fn get(&self, path: &str) -> (u16, Value) {
        let res = self.client.get(format!("{}{}", self.base, path)).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_health_reports_degraded_without_ledger() {
    let h = harness(false).await;

    let (status, body) = h.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["ledger_available"], false);
    assert_eq!(body["wallet_installed"], false);
    assert_eq!(body["channel"], Value::Null);

    let (status, _) = h.post("/reactions", json!({ "reaction": "🔥" })).await;
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_reaction_requires_channel() {
    let h = harness(true).await;
    let (status, body) = h.post("/reactions", json!({ "reaction": "🔥" })).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "No channel selected");
}

#[tokio::test]
async fn test_channel_change_then_react_and_mint() {
    let h = harness(true).await;

    let (status, body) = h.post("/channel", json!({ "channel": "#SomeStreamer" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["channel"], "somestreamer");
    assert_eq!(body["connected"], true);

    let (status, body) = h.post("/reactions", json!({ "reaction": "🔥" })).await;
    assert_eq!(status, 200);
    let reference = body["tx_reference"].as_str().unwrap().to_string();
    assert_eq!(body["explorer_url"], format!("https://explorer.test/tx/{reference}"));

    let (status, _) = h.post("/moments", json!({ "metadata": "{\"title\":\"clip\"}" })).await;
    assert_eq!(status, 200);

    assert_eq!(
        h.ledger.writes(),
        vec![
            ("reaction".to_string(), "🔥".to_string(), "somestreamer".to_string()),
            ("moment".to_string(), "{\"title\":\"clip\"}".to_string(), "somestreamer".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_write_is_bad_gateway() {
    let h = harness(true).await;
    h.post("/channel", json!({ "channel": "somestreamer" })).await;
    h.ledger.fail.store(true, Ordering::SeqCst);

    let (status, body) = h.post("/moments", json!({ "metadata": "m" })).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"], "Moment failed");
}

#[tokio::test]
async fn test_invalid_channel_is_bad_request() {
    let h = harness(true).await;
    let (status, _) = h.post("/channel", json!({ "channel": "  " })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_chat_messages_are_mirrored_into_feed() {
    let h = harness(true).await;
    h.post("/channel", json!({ "channel": "somestreamer" })).await;

    h.irc.send(&privmsg("m-1", "viewer", "somestreamer", "first!"));

    assert!(wait_until(Duration::from_secs(3), || !h.feed.confirmed().is_empty()).await);
    assert_eq!(h.ledger.comments(), vec![("viewer".to_string(), "first!".to_string())]);
    assert!(h.feed.pending().is_empty());

    let (status, body) = h.get("/feed").await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["username"], "viewer");
    assert_eq!(body[0]["message"], "first!");

    let (_, pending) = h.get("/pending").await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn test_tx_url_round_trip() {
    let h = harness(false).await;
    let reference = format!("0x{}", "ab".repeat(32));

    let (status, body) = h.get(&format!("/tx/{reference}")).await;
    assert_eq!(status, 200);
    assert_eq!(body["tx_reference"], reference);
    assert_eq!(body["explorer_url"], format!("https://explorer.test/tx/{reference}"));

    let (status, _) = h.get("/tx/not-a-hash").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_donation_without_wallet_is_unavailable() {
    let h = harness(true).await;
    let (status, body) = h.post("/donations", json!({ "amount": "0.1" })).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "No external wallet installed");

    let (status, _) = h.post("/wallet/connect", json!({})).await;
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_balance_reads_feed() {
    let h = harness(true).await;
    h.feed.set_balance("1.5".to_string());
    let (_, body) = h.get("/balance").await;
    assert_eq!(body["balance"], "1.5");
}

#[tokio::test]
async fn test_channel_switch_clears_feed() {
    let h = harness(true).await;
    h.post("/channel", json!({ "channel": "first" })).await;
    h.irc.send(&privmsg("m-1", "viewer", "first", "old channel msg"));
    assert!(wait_until(Duration::from_secs(3), || !h.feed.confirmed().is_empty()).await);

    let (status, _) = h.post("/channel", json!({ "channel": "second" })).await;
    assert_eq!(status, 200);

    let (_, feed) = h.get("/feed").await;
    assert_eq!(feed, json!([]));
    let (_, pending) = h.get("/pending").await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn test_donation_refreshes_balance() {
    let wallet = Arc::new(ScriptedWallet::default());
    let h = harness_with_wallet(true, Some(wallet.clone() as Arc<dyn Eip1193>)).await;

    let (_, before) = h.get("/balance").await;
    assert_eq!(before["balance"], "0");
    assert_eq!(before["low"], true);

    let (status, body) = h.post("/donations", json!({ "amount": "0.1" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["tx_reference"], format!("0x{}", "11".repeat(32)));
    assert!(wallet.methods().contains(&"eth_sendTransaction".to_string()));

    let (_, after) = h.get("/balance").await;
    assert_eq!(after["balance"], "1.5");
    assert_eq!(after["low"], false);
}
