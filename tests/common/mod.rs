//! Shared mock backends for integration tests: a Twitch-style IRC
//! WebSocket server and an EVM JSON-RPC node.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, B256};
use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use stream_ledger::blockchain::{Eip1193, Ledger, TxReference, WalletError};

/// Sentinel pushed through [`MockIrc::send`] to drop every connection.
const DROP_CONNECTION: &str = "\u{0}drop";

/// Mock IRC-over-WebSocket server.
///
/// Answers the login with `001`, echoes `JOIN`/`PART`, records every
/// received line, and relays lines pushed with [`MockIrc::send`].
pub struct MockIrc {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    outbound: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
}

impl MockIrc {
    pub fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn lines(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Push a raw IRC line to every connected client.
    pub fn send(&self, line: &str) {
        let _ = self.outbound.send(line.to_string());
    }

    /// Close every client connection without a requested disconnect.
    pub fn drop_connections(&self) {
        self.send(DROP_CONNECTION);
    }
}

pub async fn start_mock_irc() -> MockIrc {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let (outbound, _) = broadcast::channel(64);
    let connections = Arc::new(AtomicUsize::new(0));

    let server = MockIrc {
        addr,
        received: received.clone(),
        outbound: outbound.clone(),
        connections: connections.clone(),
    };

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let received = received.clone();
            let mut relay = outbound.subscribe();
            connections.fetch_add(1, Ordering::SeqCst);

            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                let (mut writer, mut reader) = ws.split();
                let mut nick = String::from("anonymous");

                loop {
                    tokio::select! {
                        incoming = reader.next() => {
                            let text = match incoming {
                                Some(Ok(Message::Text(text))) => text,
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => continue,
                            };
                            for line in text.as_str().split("\r\n").filter(|l| !l.is_empty()) {
                                received.lock().unwrap().push(line.to_string());
                                let reply = if let Some(name) = line.strip_prefix("NICK ") {
                                    nick = name.to_string();
                                    Some(format!(":tmi.twitch.tv 001 {nick} :Welcome, GLHF!"))
                                } else if let Some(channel) = line.strip_prefix("JOIN ") {
                                    Some(format!(":{nick}!{nick}@{nick}.tmi.twitch.tv JOIN {channel}"))
                                } else if let Some(channel) = line.strip_prefix("PART ") {
                                    Some(format!(":{nick}!{nick}@{nick}.tmi.twitch.tv PART {channel}"))
                                } else {
                                    None
                                };
                                if let Some(reply) = reply {
                                    if writer.send(Message::text(reply)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        pushed = relay.recv() => {
                            match pushed {
                                Ok(line) if line == DROP_CONNECTION => return,
                                Ok(line) => {
                                    if writer.send(Message::text(line)).await.is_err() {
                                        return;
                                    }
                                }
                                Err(_) => return,
                            }
                        }
                    }
                }
            });
        }
    });

    server
}

/// A PRIVMSG line as Twitch sends it, with IRCv3 tags.
pub fn privmsg(id: &str, user: &str, channel: &str, text: &str) -> String {
    format!("@display-name={user};id={id} :{user}!{user}@{user}.tmi.twitch.tv PRIVMSG #{channel} :{text}")
}

/// Behavior switches and observations for [`start_mock_node`].
pub struct NodeState {
    pub chain_id: u64,
    pub tx_count: AtomicU64,
    pub balance_wei: Mutex<String>,
    pub empty_code: AtomicBool,
    pub revert: AtomicBool,
    pub fail_balance: AtomicBool,
    pub raw_transactions: Mutex<Vec<String>>,
    pub methods: Mutex<Vec<String>>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            chain_id: 10143,
            tx_count: AtomicU64::new(0),
            balance_wei: Mutex::new("0x0".to_string()),
            empty_code: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
            raw_transactions: Mutex::new(Vec::new()),
            methods: Mutex::new(Vec::new()),
        }
    }
}

impl NodeState {
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

/// Mock EVM JSON-RPC node; returns its URL.
pub async fn start_mock_node(state: Arc<NodeState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(rpc)).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn rpc(State(state): State<Arc<NodeState>>, Json(body): Json<Value>) -> Json<Value> {
    match body {
        Value::Array(calls) => Json(Value::Array(
            calls.into_iter().map(|call| answer(&state, call)).collect(),
        )),
        call => Json(answer(&state, call)),
    }
}

fn answer(state: &NodeState, call: Value) -> Value {
    let id = call["id"].clone();
    let method = call["method"].as_str().unwrap_or_default().to_string();
    let params = call["params"].clone();
    state.methods.lock().unwrap().push(method.clone());

    let result = match method.as_str() {
        "eth_chainId" => json!(format!("{:#x}", state.chain_id)),
        "eth_blockNumber" => json!("0x10"),
        "eth_getCode" => {
            if state.empty_code.load(Ordering::SeqCst) {
                json!("0x")
            } else {
                json!("0x6080604052348015600f57600080fd5b50")
            }
        }
        "eth_getTransactionCount" => json!(format!("{:#x}", state.tx_count.load(Ordering::SeqCst))),
        "eth_gasPrice" => json!("0x3b9aca00"),
        "eth_estimateGas" => json!("0x186a0"),
        "eth_getBalance" => {
            if state.fail_balance.load(Ordering::SeqCst) {
                return json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": "balance unavailable" }
                });
            }
            json!(state.balance_wei.lock().unwrap().clone())
        }
        "eth_sendRawTransaction" => {
            let raw = params[0].as_str().unwrap_or_default().to_string();
            let bytes = alloy::primitives::hex::decode(&raw).unwrap_or_default();
            state.raw_transactions.lock().unwrap().push(raw);
            state.tx_count.fetch_add(1, Ordering::SeqCst);
            json!(keccak256(bytes).to_string())
        }
        "eth_getTransactionReceipt" => {
            let hash = params[0].as_str().unwrap_or_default();
            receipt(hash, !state.revert.load(Ordering::SeqCst))
        }
        other => {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method {other} not found") }
            });
        }
    };

    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn receipt(hash: &str, success: bool) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x42).to_string(),
        "blockNumber": "0x10",
        "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        "to": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        "cumulativeGasUsed": "0x186a0",
        "gasUsed": "0x186a0",
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "type": "0x0",
        "status": if success { "0x1" } else { "0x0" }
    })
}

/// Anvil's first development key.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const TEST_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Ledger double for surfaces that sit above the ledger service.
#[derive(Default)]
pub struct MockLedger {
    pub fail: AtomicBool,
    pub comments: Mutex<Vec<(String, String)>>,
    pub writes: Mutex<Vec<(String, String, String)>>,
}

impl MockLedger {
    fn reference(&self) -> Option<TxReference> {
        (!self.fail.load(Ordering::SeqCst)).then(|| TxReference(B256::repeat_byte(0xab)))
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn post_comment(&self, username: &str, message: &str) -> Option<TxReference> {
        self.comments
            .lock()
            .unwrap()
            .push((username.to_string(), message.to_string()));
        self.reference()
    }

    async fn post_reaction(&self, reaction: &str, streamer: &str) -> Option<TxReference> {
        self.writes
            .lock()
            .unwrap()
            .push(("reaction".into(), reaction.to_string(), streamer.to_string()));
        self.reference()
    }

    async fn mint_moment(&self, metadata: &str, streamer: &str) -> Option<TxReference> {
        self.writes
            .lock()
            .unwrap()
            .push(("moment".into(), metadata.to_string(), streamer.to_string()));
        self.reference()
    }

    async fn query_balance(&self) -> String {
        "1.5".to_string()
    }
}

/// EIP-1193 wallet that approves everything and records each method.
#[derive(Default)]
pub struct ScriptedWallet {
    pub methods: Mutex<Vec<String>>,
}

impl ScriptedWallet {
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

#[async_trait]
impl Eip1193 for ScriptedWallet {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, WalletError> {
        self.methods.lock().unwrap().push(method.to_string());
        Ok(match method {
            "eth_requestAccounts" => json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"]),
            "eth_gasPrice" => json!("0x3b9aca00"),
            "eth_sendTransaction" => json!(B256::repeat_byte(0x11).to_string()),
            "eth_getTransactionReceipt" => json!({ "status": "0x1" }),
            _ => Value::Null,
        })
    }
}

/// Poll `check` every 10 ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
