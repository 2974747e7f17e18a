//! In-memory feed: comments awaiting confirmation and confirmed entries.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::blockchain::TxReference;
use crate::chat::ChatMessage;
use crate::config::FeedConfig;

/// A comment mirrored on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedEntry {
    pub username: String,
    pub message: String,
    /// Epoch seconds at confirmation.
    pub timestamp: u64,
    pub tx_reference: TxReference,
}

impl ConfirmedEntry {
    pub fn now(message: &ChatMessage, tx_reference: TxReference) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            username: message.username.clone(),
            message: message.text.clone(),
            timestamp,
            tx_reference,
        }
    }
}

#[derive(Debug)]
struct FeedState {
    pending: Vec<ChatMessage>,
    confirmed: VecDeque<ConfirmedEntry>,
    balance: String,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            confirmed: VecDeque::new(),
            balance: "0".to_string(),
        }
    }
}

/// Shared feed handle. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Feed {
    state: Arc<RwLock<FeedState>>,
    minimum_gas_fund: f64,
}

impl Default for Feed {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            state: Arc::default(),
            minimum_gas_fund: config.minimum_gas_fund,
        }
    }

    pub fn add_pending(&self, message: ChatMessage) {
        self.write(|state| state.pending.push(message));
    }

    /// Remove a pending message by id, returning it if present.
    pub fn resolve(&self, id: &str) -> Option<ChatMessage> {
        self.write(|state| {
            let index = state.pending.iter().position(|m| m.id == id)?;
            Some(state.pending.remove(index))
        })
    }

    /// Prepend a confirmed entry (newest first).
    pub fn confirm(&self, entry: ConfirmedEntry) {
        self.write(|state| state.confirmed.push_front(entry));
    }

    /// Forget pending and confirmed entries of the previous channel.
    pub fn clear(&self) {
        self.write(|state| {
            state.pending.clear();
            state.confirmed.clear();
        });
    }

    pub fn set_balance(&self, balance: String) {
        self.write(|state| state.balance = balance);
    }

    pub fn pending(&self) -> Vec<ChatMessage> {
        self.read(|state| state.pending.clone())
    }

    pub fn confirmed(&self) -> Vec<ConfirmedEntry> {
        self.read(|state| state.confirmed.iter().cloned().collect())
    }

    pub fn balance(&self) -> String {
        self.read(|state| state.balance.clone())
    }

    /// True when the contract balance cannot cover further writes.
    pub fn gas_fund_low(&self) -> bool {
        self.read(|state| is_below(&state.balance, self.minimum_gas_fund))
    }

    fn read<T>(&self, f: impl FnOnce(&FeedState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut FeedState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// An unparseable balance counts as zero.
fn is_below(balance: &str, minimum: f64) -> bool {
    balance.trim().parse::<f64>().unwrap_or(0.0) < minimum
}
