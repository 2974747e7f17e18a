//! Chat ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! Twitch IRC (WebSocket)
//!     → connection.rs (login, PING/PONG, JOIN/PART acks)
//!     → irc.rs (line parsing → ChatMessage)
//!     → service.rs (pump → registered handler; reconnect on drop)
//! ```
//!
//! # Design Decisions
//! - One connection, one channel, one handler at a time
//! - Connect failures carry a `ConnectErrorKind` from the point of failure
//! - After the retry ceiling the caller gets `RetriesExhausted`, never a panic
//! - Channel switch and teardown are bounded; a stuck switch reinitializes

pub mod connection;
pub mod irc;
pub mod service;
pub mod types;

pub use connection::{ChatConnector, ChatLink, Connection, TwitchConnector};
pub use service::{ChatService, MessageHandler};
pub use types::{ChannelName, ChatError, ChatEvent, ChatMessage, ChatResult};
