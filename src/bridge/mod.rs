//! Mediator between chat ingestion and the ledger.
//!
//! # Data Flow
//! ```text
//! ChatService handler
//!     → Feed::add_pending
//!     → Ledger::post_comment (spawned task)
//!     → Feed::resolve (success or failure)
//!     → Feed::confirm (success only)
//!
//! BalancePoller (timer) → Ledger::query_balance → Feed::set_balance
//! ```
//!
//! The chat and ledger services never reference each other; only this
//! module holds both.

pub mod feed;
pub mod poller;

use std::sync::Arc;

use crate::blockchain::{Ledger, TxReference};
use crate::chat::{ChatMessage, ChatService};
use crate::config::FeedConfig;

pub use feed::{ConfirmedEntry, Feed};
pub use poller::BalancePoller;

pub struct Bridge {
    chat: ChatService,
    ledger: Arc<dyn Ledger>,
    feed: Feed,
    mirror_comments: bool,
}

impl Bridge {
    pub fn new(chat: ChatService, ledger: Arc<dyn Ledger>, feed: Feed, config: &FeedConfig) -> Self {
        Self {
            chat,
            ledger,
            feed,
            mirror_comments: config.mirror_comments,
        }
    }

    /// Register the chat handler that mirrors messages on-chain.
    pub fn attach(&self) {
        if !self.mirror_comments {
            tracing::info!("Comment mirroring disabled");
            return;
        }

        let ledger = self.ledger.clone();
        let feed = self.feed.clone();
        self.chat.set_message_handler(move |message| {
            let ledger = ledger.clone();
            let feed = feed.clone();
            tokio::spawn(async move {
                mirror_message(ledger.as_ref(), &feed, message).await;
            });
        });
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }
}

/// Track `message` as pending, post it, then move it to the confirmed
/// feed on success. Failed posts are dropped without retry.
pub async fn mirror_message(
    ledger: &dyn Ledger,
    feed: &Feed,
    message: ChatMessage,
) -> Option<TxReference> {
    feed.add_pending(message.clone());
    let result = ledger.post_comment(&message.username, &message.text).await;
    feed.resolve(&message.id);

    match result {
        Some(reference) => {
            feed.confirm(ConfirmedEntry::now(&message, reference));
            Some(reference)
        }
        None => {
            tracing::warn!(id = %message.id, username = %message.username, "Comment was not mirrored");
            None
        }
    }
}
