//! Chat-specific types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::{ConnectErrorKind, DeadlineElapsed, Retryable};

/// A normalized channel name: trimmed, lowercased, without a leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Normalize and validate a user-supplied channel name.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let name = raw.trim().trim_start_matches('#').trim().to_lowercase();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ChatError::InvalidChannel(raw.to_string()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IRC form of the channel (`#name`).
    pub fn irc(&self) -> String {
        format!("#{}", self.0)
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as delivered to the registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub text: String,
}

/// Events produced by a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(ChatMessage),
    /// The connection ended. `requested` is true only for local teardown.
    Disconnected { requested: bool, reason: String },
}

/// Errors that can occur during chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty or malformed channel name. Never retried.
    #[error("Invalid channel name provided: '{0}'")]
    InvalidChannel(String),

    /// A connection attempt failed.
    #[error("{kind}: {message}")]
    Connect {
        kind: ConnectErrorKind,
        message: String,
    },

    /// Every permitted connection attempt failed.
    #[error(
        "Failed to connect after {retries} retries.\n\
         Please verify:\n\
         1. Your internet connection is stable\n\
         2. Twitch services are accessible from your network\n\
         3. No firewall is blocking the connection\n\
         Original error: {source}"
    )]
    RetriesExhausted {
        retries: u32,
        kind: ConnectErrorKind,
        source: Box<ChatError>,
    },

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),

    /// The connection went away while an operation was in flight.
    #[error("Not connected to chat")]
    NotConnected,

    /// The server rejected the session (e.g. login refused).
    #[error("Chat protocol error: {0}")]
    Protocol(String),
}

impl ChatError {
    pub fn connect(kind: ConnectErrorKind, message: impl Into<String>) -> Self {
        ChatError::Connect {
            kind,
            message: message.into(),
        }
    }
}

impl Retryable for ChatError {
    fn retry_kind(&self) -> Option<ConnectErrorKind> {
        match self {
            ChatError::Connect { kind, .. } => Some(*kind),
            ChatError::Timeout(_) | ChatError::NotConnected => Some(ConnectErrorKind::Generic),
            ChatError::InvalidChannel(_)
            | ChatError::RetriesExhausted { .. }
            | ChatError::Protocol(_) => None,
        }
    }
}

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
