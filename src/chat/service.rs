//! Chat ingestion service.
//!
//! Owns at most one connection, scoped to one channel. All state changes
//! (initialize, channel change, reconnect) happen under one async lock;
//! a per-connection pump task dispatches messages to the handler and
//! drives reconnects after unexpected disconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::chat::connection::{ChatConnector, ChatLink, Connection, TwitchConnector};
use crate::chat::types::{ChannelName, ChatError, ChatEvent, ChatMessage, ChatResult};
use crate::config::ChatConfig;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, with_deadline, BackoffPolicy, RetryError};

/// Callback receiving every chat message.
pub type MessageHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;

/// Chat ingestion service. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn ChatConnector>,
    policy: BackoffPolicy,
    max_retries: u32,
    teardown_timeout: Duration,
    switch_timeout: Duration,
    handler: RwLock<Option<MessageHandler>>,
    state: Mutex<State>,
    /// Bumped whenever the active connection is replaced or dropped.
    generation: AtomicU64,
}

#[derive(Default)]
struct State {
    link: Option<Arc<dyn ChatLink>>,
    channel: Option<ChannelName>,
}

impl ChatService {
    pub fn new(config: &ChatConfig, connector: Arc<dyn ChatConnector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                policy: BackoffPolicy::from_config(&config.retry),
                max_retries: config.retry.max_retries,
                teardown_timeout: Duration::from_secs(config.teardown_timeout_secs),
                switch_timeout: Duration::from_secs(config.channel_switch_timeout_secs),
                handler: RwLock::new(None),
                state: Mutex::new(State::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Service backed by the Twitch WebSocket endpoint in `config`.
    pub fn twitch(config: &ChatConfig) -> Self {
        Self::new(config, Arc::new(TwitchConnector::new(config)))
    }

    /// Replace the message handler. At most one handler is active.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        let mut slot = self.inner.handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Tear down any existing connection and connect to `channel`,
    /// retrying per the backoff policy.
    pub async fn initialize(&self, channel: &str) -> ChatResult<()> {
        let channel = ChannelName::parse(channel).inspect_err(|e| {
            tracing::error!(error = %e, "Error initializing chat client");
        })?;
        let mut state = self.inner.state.lock().await;
        self.inner.open(&mut state, channel).await
    }

    /// Move to `new_channel`, reusing the connection when possible.
    pub async fn change_channel(&self, new_channel: &str) -> ChatResult<()> {
        let channel = ChannelName::parse(new_channel).inspect_err(|e| {
            tracing::error!(error = %e, "Invalid channel name provided for channel change");
        })?;

        let mut state = self.inner.state.lock().await;
        if state.channel.as_ref() == Some(&channel) {
            return Ok(());
        }

        let Some(link) = state.link.clone() else {
            tracing::info!("No existing client, initializing new connection");
            return self.inner.open(&mut state, channel).await;
        };

        tracing::info!(channel = %channel, "Attempting to change channel");
        let previous = state.channel.clone();
        let switch = async {
            if let Some(previous) = &previous {
                link.part(previous).await?;
            }
            link.join(&channel).await
        };

        match with_deadline("channel change", self.inner.switch_timeout, switch).await {
            Ok(Ok(())) => {
                tracing::info!(channel = %channel, "Successfully changed channel");
                state.channel = Some(channel);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error changing channel");
                self.inner.teardown(&mut state).await;
                Err(e)
            }
            Err(elapsed) => {
                tracing::warn!(error = %elapsed, "Attempting to reinitialize client after timeout");
                self.inner.open(&mut state, channel).await
            }
        }
    }

    /// Channel of the active connection.
    pub async fn current_channel(&self) -> Option<ChannelName> {
        self.inner.state.lock().await.channel.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.link.is_some()
    }

    /// Requested disconnect; never triggers a reconnect.
    pub async fn disconnect(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.teardown(&mut state).await;
    }
}

impl Inner {
    async fn open(self: &Arc<Self>, state: &mut State, channel: ChannelName) -> ChatResult<()> {
        self.teardown(state).await;

        tracing::info!(channel = %channel, "Initializing chat client");
        let connection = self.connect_with_retry(&channel).await.inspect_err(|e| {
            tracing::error!(error = %e, "Error initializing chat client");
        })?;

        let generation = self.install(state, channel, connection.link);
        tokio::spawn(pump(Arc::downgrade(self), generation, connection.events));
        Ok(())
    }

    /// Drop the active connection with a bounded wait.
    async fn teardown(&self, state: &mut State) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.channel = None;
        let Some(link) = state.link.take() else {
            return;
        };

        tracing::info!("Disconnecting existing client");
        match with_deadline("chat teardown", self.teardown_timeout, link.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Error while disconnecting client"),
            Err(_) => tracing::warn!("Force disconnecting client due to timeout"),
        }
    }

    async fn connect_with_retry(&self, channel: &ChannelName) -> ChatResult<Connection> {
        retry_with_backoff(&self.policy, self.max_retries, |_| self.connector.connect(channel))
            .await
            .map_err(|e| match e {
                RetryError::NotRetryable(e) => e,
                RetryError::Exhausted { attempts, kind, last } => ChatError::RetriesExhausted {
                    retries: attempts.saturating_sub(1),
                    kind,
                    source: Box::new(last),
                },
            })
    }

    fn install(&self, state: &mut State, channel: ChannelName, link: Box<dyn ChatLink>) -> u64 {
        state.link = Some(Arc::from(link));
        state.channel = Some(channel);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn dispatch(&self, message: ChatMessage) {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            metrics::record_chat_message();
            handler(message);
        }
    }

    /// Reconnect after an unexpected disconnect. Returns the new
    /// generation and event stream, or `None` when the pump should stop.
    async fn reconnect(
        &self,
        generation: u64,
        reason: &str,
    ) -> Option<(u64, mpsc::UnboundedReceiver<ChatEvent>)> {
        tracing::warn!(reason = %reason, "Unexpected disconnect, scheduling reconnect");
        tokio::time::sleep(self.policy.base()).await;

        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            tracing::debug!("Connection replaced while waiting, skipping reconnect");
            return None;
        }
        let channel = state.channel.clone()?;
        state.link = None;

        metrics::record_chat_reconnect();
        tracing::info!(channel = %channel, "Attempting to reconnect");
        match self.connect_with_retry(&channel).await {
            Ok(connection) => {
                let generation = self.install(&mut state, channel, connection.link);
                Some((generation, connection.events))
            }
            Err(e) => {
                tracing::error!(error = %e, "Reconnect failed, chat ingestion stopped");
                state.channel = None;
                self.generation.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }
}

async fn pump(
    inner: Weak<Inner>,
    mut generation: u64,
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.is_current(generation) {
            return;
        }

        match event {
            ChatEvent::Message(message) => inner.dispatch(message),
            ChatEvent::Disconnected { requested: true, .. } => return,
            ChatEvent::Disconnected { requested: false, reason } => {
                match inner.reconnect(generation, &reason).await {
                    Some((next_generation, next_events)) => {
                        generation = next_generation;
                        events = next_events;
                    }
                    None => return,
                }
            }
        }
    }
}
