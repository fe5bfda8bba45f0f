//! Engine configuration.

use tally_core::constants::DEFAULT_SYNC_LOOKAHEAD;
use tally_core::types::FeeLevel;
use tally_network::config::parse_var;
use tally_network::{CacheConfig, ClientConfig, ConfigError};

use crate::coin_selection::SortingStrategy;

/// Everything a [`WalletSession`](crate::session::WalletSession) needs besides
/// its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub client: ClientConfig,
    pub cache: CacheConfig,
    pub sorting_strategy: SortingStrategy,
    /// Receive addresses returned by `addresses_for_sync`.
    pub sync_lookahead: u32,
    pub default_fee_level: FeeLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            cache: CacheConfig::default(),
            sorting_strategy: SortingStrategy::default(),
            sync_lookahead: DEFAULT_SYNC_LOOKAHEAD,
            default_fee_level: FeeLevel::default(),
        }
    }
}

fn parse_strategy(value: &str) -> Option<SortingStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "ascent" | "ascent_draw" => Some(SortingStrategy::AscentDraw),
        "descent" | "descent_draw" => Some(SortingStrategy::DescentDraw),
        _ => None,
    }
}

/// `regular`, `priority`, or a custom rate in sat/vB.
fn parse_fee_level(value: &str) -> Option<FeeLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "regular" => Some(FeeLevel::Regular),
        "priority" => Some(FeeLevel::Priority),
        other => other.parse().ok().map(FeeLevel::Custom),
    }
}

impl EngineConfig {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn testnet() -> Self {
        Self {
            client: ClientConfig::testnet(),
            ..Self::default()
        }
    }

    /// Load from the environment. See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the client and cache variables plus `TALLY_SORTING_STRATEGY`
    /// (`ascent`/`descent`), `TALLY_SYNC_LOOKAHEAD` and `TALLY_FEE_LEVEL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            client: ClientConfig::from_lookup(&lookup)?,
            cache: CacheConfig::from_lookup(&lookup)?,
            ..Self::default()
        };
        if let Some(value) = lookup("TALLY_SORTING_STRATEGY") {
            config.sorting_strategy = parse_strategy(&value).ok_or_else(|| ConfigError::Invalid {
                key: "TALLY_SORTING_STRATEGY".into(),
                value: value.clone(),
            })?;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "TALLY_SYNC_LOOKAHEAD")? {
            config.sync_lookahead = n;
        }
        if let Some(value) = lookup("TALLY_FEE_LEVEL") {
            config.default_fee_level = parse_fee_level(&value).ok_or_else(|| ConfigError::Invalid {
                key: "TALLY_FEE_LEVEL".into(),
                value: value.clone(),
            })?;
        }
        Ok(config)
    }
}
