//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::BridgeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `blockchain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "STREAM_LEDGER_RPC_URL";
/// Environment variable overriding `blockchain.contract_address`.
pub const CONTRACT_ADDRESS_ENV_VAR: &str = "STREAM_LEDGER_CONTRACT_ADDRESS";
/// Environment variable holding the service signing key.
pub const PRIVATE_KEY_ENV_VAR: &str = "STREAM_LEDGER_PRIVATE_KEY";
/// Environment variable overriding `chat.channel`.
pub const CHANNEL_ENV_VAR: &str = "STREAM_LEDGER_CHANNEL";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;
    finish(config, |name| std::env::var(name).ok())
}

/// Like [`load_config`], but a missing file falls back to defaults.
pub fn load_or_default(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => finish(parse_config(&content)?, |name| std::env::var(name).ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            finish(BridgeConfig::default(), |name| std::env::var(name).ok())
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Parse TOML text without validating it.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn finish<F>(mut config: BridgeConfig, lookup: F) -> Result<BridgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides. The private key is only ever read here.
pub fn apply_env<F>(config: &mut BridgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV_VAR) {
        config.blockchain.rpc_url = url;
    }
    if let Some(address) = lookup(CONTRACT_ADDRESS_ENV_VAR) {
        config.blockchain.contract_address = address;
    }
    if let Some(channel) = lookup(CHANNEL_ENV_VAR) {
        config.chat.channel = channel;
    }
    config.blockchain.private_key = lookup(PRIVATE_KEY_ENV_VAR).filter(|k| !k.trim().is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = parse_config(
            r#"
            [chat]
            channel = "from_file"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (RPC_URL_ENV_VAR, "http://127.0.0.1:8545"),
            (CONTRACT_ADDRESS_ENV_VAR, "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            (PRIVATE_KEY_ENV_VAR, "0xabc"),
            (CHANNEL_ENV_VAR, "from_env"),
        ]
        .into_iter()
        .collect();

        apply_env(&mut config, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.blockchain.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.chat.channel, "from_env");
        assert_eq!(config.blockchain.private_key.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_blank_private_key_is_ignored() {
        let mut config = BridgeConfig::default();
        apply_env(&mut config, |name| {
            (name == PRIVATE_KEY_ENV_VAR).then(|| "   ".to_string())
        });
        assert!(config.blockchain.private_key.is_none());
    }

    #[test]
    fn test_validation_error_display() {
        let config = BridgeConfig::default();
        let err = finish(config, |_| None).unwrap_err();
        assert!(err.to_string().contains("blockchain.contract_address"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[chat\nchannel = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
