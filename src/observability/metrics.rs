//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chat_messages_total` (counter): chat messages dispatched to the handler
//! - `chat_reconnects_total` (counter): reconnects after unexpected disconnects
//! - `ledger_submissions_total` (counter): contract writes by kind, outcome
//! - `ledger_contract_balance_ether` (gauge): last polled contract balance

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_chat_message() {
    metrics::counter!("chat_messages_total").increment(1);
}

pub fn record_chat_reconnect() {
    metrics::counter!("chat_reconnects_total").increment(1);
}

/// Record a contract write outcome (`kind` = comment/reaction/moment/donation).
pub fn record_submission(kind: &'static str, success: bool) {
    let outcome = if success { "confirmed" } else { "failed" };
    metrics::counter!("ledger_submissions_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

pub fn record_balance(ether: &str) {
    if let Ok(value) = ether.parse::<f64>() {
        metrics::gauge!("ledger_contract_balance_ether").set(value);
    }
}
