//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retry ceiling)
//! - Validate addresses and URLs before any subsystem sees them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;

use crate::config::schema::BridgeConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.chat.endpoint.starts_with("ws://") && !config.chat.endpoint.starts_with("wss://") {
        errors.push(ValidationError::new(
            "chat.endpoint",
            format!("expected a ws:// or wss:// URL, got '{}'", config.chat.endpoint),
        ));
    }
    if config.chat.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("chat.connect_timeout_secs", "must be > 0"));
    }
    if config.chat.teardown_timeout_secs == 0 {
        errors.push(ValidationError::new("chat.teardown_timeout_secs", "must be > 0"));
    }
    if config.chat.channel_switch_timeout_secs == 0 {
        errors.push(ValidationError::new("chat.channel_switch_timeout_secs", "must be > 0"));
    }
    if config.chat.retry.max_delay_ms < config.chat.retry.base_delay_ms {
        errors.push(ValidationError::new(
            "chat.retry.max_delay_ms",
            "must be >= chat.retry.base_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&config.chat.retry.jitter_ratio) {
        errors.push(ValidationError::new("chat.retry.jitter_ratio", "must be within 0.0..=1.0"));
    }

    if url::Url::parse(&config.blockchain.rpc_url).is_err() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("invalid URL '{}'", config.blockchain.rpc_url),
        ));
    }
    for failover in &config.blockchain.failover_urls {
        if url::Url::parse(failover).is_err() {
            errors.push(ValidationError::new(
                "blockchain.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if config.blockchain.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "blockchain.contract_address",
            format!("invalid address '{}'", config.blockchain.contract_address),
        ));
    }
    if config.blockchain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if config.blockchain.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.confirmation_timeout_secs", "must be > 0"));
    }

    if let Some(endpoint) = &config.wallet.endpoint {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "wallet.endpoint",
                format!("invalid URL '{}'", endpoint),
            ));
        }
    }
    if config.wallet.gas_price_multiplier == 0 {
        errors.push(ValidationError::new("wallet.gas_price_multiplier", "must be > 0"));
    }

    if config.feed.balance_poll_secs == 0 {
        errors.push(ValidationError::new("feed.balance_poll_secs", "must be > 0"));
    }
    if !config.feed.minimum_gas_fund.is_finite() || config.feed.minimum_gas_fund < 0.0 {
        errors.push(ValidationError::new("feed.minimum_gas_fund", "must be a non-negative number"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.blockchain.contract_address =
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.chat.endpoint = "http://irc.example".to_string();
        config.blockchain.contract_address = "not-an-address".to_string();
        config.feed.balance_poll_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["chat.endpoint", "blockchain.contract_address", "feed.balance_poll_secs"]
        );
    }

    #[test]
    fn test_rejects_negative_gas_fund_minimum() {
        let mut config = valid_config();
        config.feed.minimum_gas_fund = -1.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "feed.minimum_gas_fund");
    }

    #[test]
    fn test_rejects_inverted_retry_bounds() {
        let mut config = valid_config();
        config.chat.retry.base_delay_ms = 5000;
        config.chat.retry.max_delay_ms = 1000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "chat.retry.max_delay_ms");
    }
}
