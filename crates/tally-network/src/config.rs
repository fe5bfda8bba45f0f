//! Backend and cache configuration.

use std::time::Duration;

use tally_core::constants::{DEFAULT_FEE_CACHE_TTL_SECS, DEFAULT_UTXO_CACHE_TTL_SECS};
use thiserror::Error;

pub const MAINNET_API_URL: &str = "https://api.blockchain.info";
pub const TESTNET_API_URL: &str = "https://api.blockchain.info/testnet";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")] Invalid { key: String, value: String },
}

/// Read an optional numeric variable through `lookup`.
pub fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key: key.to_string(), value }),
    }
}

/// HTTP client configuration for the chain data backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: MAINNET_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("tally/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn testnet() -> Self {
        Self {
            base_url: TESTNET_API_URL.to_string(),
            ..Self::default()
        }
    }

    /// Load from `TALLY_API_URL` and `TALLY_REQUEST_TIMEOUT_SECS`, falling
    /// back to the mainnet defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("TALLY_API_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TALLY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Lifetimes of cached backend responses.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Unspent outputs and multi-address responses.
    pub utxo_ttl: Duration,
    /// Fee quotes.
    pub fee_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            utxo_ttl: Duration::from_secs(DEFAULT_UTXO_CACHE_TTL_SECS),
            fee_ttl: Duration::from_secs(DEFAULT_FEE_CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    /// Load from `TALLY_UTXO_CACHE_TTL_SECS` and `TALLY_FEE_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64>(&lookup, "TALLY_UTXO_CACHE_TTL_SECS")? {
            config.utxo_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TALLY_FEE_CACHE_TTL_SECS")? {
            config.fee_ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
