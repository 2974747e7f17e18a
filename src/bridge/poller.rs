//! Periodic contract balance refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::blockchain::Ledger;
use crate::bridge::feed::Feed;
use crate::observability::metrics;

pub struct BalancePoller {
    ledger: Arc<dyn Ledger>,
    feed: Feed,
    interval: Duration,
}

impl BalancePoller {
    pub fn new(ledger: Arc<dyn Ledger>, feed: Feed, interval: Duration) -> Self {
        Self {
            ledger,
            feed,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Refresh the balance once.
    pub async fn poll_once(&self) {
        let balance = self.ledger.query_balance().await;
        metrics::record_balance(&balance);
        tracing::debug!(balance = %balance, "Contract balance refreshed");
        self.feed.set_balance(balance);
        if self.feed.gas_fund_low() {
            tracing::warn!(balance = %self.feed.balance(), "Gas fund low");
        }
    }

    /// Poll until shutdown. The first poll happens immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Balance poller starting");
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Balance poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
