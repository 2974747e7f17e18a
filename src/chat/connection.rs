//! Chat connections: the connector/link seam and the Twitch WebSocket
//! implementation.
//!
//! # Responsibilities
//! - Resolve, connect and log in, classifying failures at the source
//! - Pump inbound lines into [`ChatEvent`]s on a channel
//! - Answer `PING`, track JOIN/PART acknowledgements
//! - Report unexpected vs requested disconnects

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::chat::irc::{self, IrcMessage};
use crate::chat::types::{ChannelName, ChatError, ChatEvent, ChatResult};
use crate::config::ChatConfig;
use crate::resilience::{with_deadline, ConnectErrorKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// An established connection: control handle plus its event stream.
pub struct Connection {
    pub link: Box<dyn ChatLink>,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
}

/// Opens connections scoped to a channel.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    async fn connect(&self, channel: &ChannelName) -> ChatResult<Connection>;
}

/// Control side of a live connection.
///
/// `join` and `part` resolve once the server acknowledges them; callers
/// bound them with their own deadline.
#[async_trait]
pub trait ChatLink: Send + Sync {
    async fn join(&self, channel: &ChannelName) -> ChatResult<()>;
    async fn part(&self, channel: &ChannelName) -> ChatResult<()>;
    async fn disconnect(&self) -> ChatResult<()>;
}

/// Connector for Twitch IRC over WebSocket.
#[derive(Debug, Clone)]
pub struct TwitchConnector {
    endpoint: String,
    nick: Option<String>,
    connect_timeout: Duration,
}

impl TwitchConnector {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            nick: config.nick.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    async fn resolve(&self) -> ChatResult<()> {
        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| ChatError::Protocol(format!("Invalid endpoint '{}': {}", self.endpoint, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ChatError::Protocol(format!("Endpoint '{}' has no host", self.endpoint)))?;
        let port = url.port_or_known_default().unwrap_or(443);

        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ChatError::connect(ConnectErrorKind::Dns, format!("{host}: {e}")))?;
        if addrs.next().is_none() {
            return Err(ChatError::connect(
                ConnectErrorKind::Dns,
                format!("{host}: address could not be found"),
            ));
        }
        Ok(())
    }

    async fn establish(&self, channel: &ChannelName) -> ChatResult<Connection> {
        self.resolve().await?;

        let (stream, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| classify_ws_error(&e))?;
        let (mut writer, mut reader) = stream.split();

        let nick = self.nick.clone().unwrap_or_else(irc::anonymous_nick);
        for line in [irc::cap_req(), irc::pass(irc::ANONYMOUS_PASS), irc::nick(&nick)] {
            send_line(&mut writer, line).await?;
        }

        await_welcome(&mut writer, &mut reader).await?;
        send_line(&mut writer, irc::join(channel)).await?;

        tracing::info!(channel = %channel, nick = %nick, "Connected to chat");

        let writer = Arc::new(Mutex::new(writer));
        let closing = Arc::new(AtomicBool::new(false));
        let (membership_tx, membership_rx) = watch::channel(BTreeSet::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_loop(
            reader,
            writer.clone(),
            nick.to_lowercase(),
            membership_tx,
            events_tx,
            closing.clone(),
        ));

        let link = TwitchLink {
            writer,
            membership: membership_rx,
            closing,
            reader: Mutex::new(Some(reader_task)),
        };

        Ok(Connection {
            link: Box::new(link),
            events: events_rx,
        })
    }
}

#[async_trait]
impl ChatConnector for TwitchConnector {
    async fn connect(&self, channel: &ChannelName) -> ChatResult<Connection> {
        with_deadline("chat connect", self.connect_timeout, self.establish(channel)).await?
    }
}

/// Live Twitch connection handle.
pub struct TwitchLink {
    writer: Arc<Mutex<WsWriter>>,
    membership: watch::Receiver<BTreeSet<String>>,
    closing: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TwitchLink {
    async fn send(&self, line: String) -> ChatResult<()> {
        let mut writer = self.writer.lock().await;
        send_line(&mut writer, line).await
    }

    async fn wait_membership<F>(&self, predicate: F) -> ChatResult<()>
    where
        F: FnMut(&BTreeSet<String>) -> bool,
    {
        let mut membership = self.membership.clone();
        membership
            .wait_for(predicate)
            .await
            .map(|_| ())
            .map_err(|_| ChatError::NotConnected)
    }
}

#[async_trait]
impl ChatLink for TwitchLink {
    async fn join(&self, channel: &ChannelName) -> ChatResult<()> {
        self.send(irc::join(channel)).await?;
        let name = channel.as_str();
        self.wait_membership(|joined| joined.contains(name)).await
    }

    async fn part(&self, channel: &ChannelName) -> ChatResult<()> {
        self.send(irc::part(channel)).await?;
        let name = channel.as_str();
        self.wait_membership(|joined| !joined.contains(name)).await
    }

    async fn disconnect(&self) -> ChatResult<()> {
        self.closing.store(true, Ordering::SeqCst);
        {
            let mut writer = self.writer.lock().await;
            // The peer may already be gone; the reader still has to finish.
            let _ = writer.send(Message::Close(None)).await;
        }
        if let Some(handle) = self.reader.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

impl Drop for TwitchLink {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

async fn send_line(writer: &mut WsWriter, line: String) -> ChatResult<()> {
    writer
        .send(Message::Text(line.into()))
        .await
        .map_err(|e| classify_ws_error(&e))
}

/// Read until `001` (welcome). Anything else that ends the session first
/// is a connect failure.
async fn await_welcome(writer: &mut WsWriter, reader: &mut WsReader) -> ChatResult<()> {
    loop {
        let frame = match reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(classify_ws_error(&e)),
            None => {
                return Err(ChatError::connect(
                    ConnectErrorKind::ConnectionClosed,
                    "Connection closed before login completed",
                ))
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => {
                return Err(ChatError::connect(
                    ConnectErrorKind::ConnectionClosed,
                    "Connection closed before login completed",
                ))
            }
            _ => continue,
        };

        for msg in text.as_str().split("\r\n").filter_map(IrcMessage::parse) {
            match msg.command.as_str() {
                "001" => return Ok(()),
                "PING" => send_line(writer, irc::pong(&msg.params)).await?,
                "NOTICE" => {
                    let notice = msg.params.last().cloned().unwrap_or_default();
                    if notice.contains("authentication failed") || notice.contains("Improperly formatted auth") {
                        return Err(ChatError::Protocol(notice));
                    }
                }
                _ => {}
            }
        }
    }
}

async fn read_loop(
    mut reader: WsReader,
    writer: Arc<Mutex<WsWriter>>,
    own_nick: String,
    membership: watch::Sender<BTreeSet<String>>,
    events: mpsc::UnboundedSender<ChatEvent>,
    closing: Arc<AtomicBool>,
) {
    let reason = loop {
        let text = match reader.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or_else(|| "Connection closed".to_string(), |f| f.reason.as_str().to_string());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break e.to_string(),
            None => break "Connection closed".to_string(),
        };

        let mut reconnect_requested = false;
        for msg in text.as_str().split("\r\n").filter_map(IrcMessage::parse) {
            match msg.command.as_str() {
                "PING" => {
                    let mut w = writer.lock().await;
                    if let Err(e) = send_line(&mut w, irc::pong(&msg.params)).await {
                        tracing::warn!(error = %e, "Failed to answer PING");
                    }
                }
                "JOIN" | "PART" if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(&own_nick)) => {
                    if let Some(channel) = msg.channel() {
                        let channel = channel.to_lowercase();
                        let joined = msg.command == "JOIN";
                        tracing::debug!(channel = %channel, joined, "Membership changed");
                        membership.send_modify(|set| {
                            if joined {
                                set.insert(channel);
                            } else {
                                set.remove(&channel);
                            }
                        });
                    }
                }
                "PRIVMSG" => {
                    if msg.nick().is_some_and(|n| n.eq_ignore_ascii_case(&own_nick)) {
                        continue;
                    }
                    if let Some(chat) = msg.to_chat_message() {
                        let _ = events.send(ChatEvent::Message(chat));
                    }
                }
                "RECONNECT" => reconnect_requested = true,
                _ => {}
            }
        }
        if reconnect_requested {
            break "Server requested reconnect".to_string();
        }
    };

    let requested = closing.load(Ordering::SeqCst);
    tracing::info!(reason = %reason, requested, "Disconnected from chat");
    let _ = events.send(ChatEvent::Disconnected { requested, reason });
}

/// Map a WebSocket failure onto a retry class.
pub fn classify_ws_error(error: &tungstenite::Error) -> ChatError {
    let kind = match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectErrorKind::ConnectionClosed
        }
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            ConnectErrorKind::ConnectionClosed
        }
        tungstenite::Error::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe => ConnectErrorKind::ConnectionClosed,
            _ => ConnectErrorKind::Generic,
        },
        _ => ConnectErrorKind::Generic,
    };
    ChatError::connect(kind, error.to_string())
}
