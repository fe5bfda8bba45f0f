//! Core data types: chains, accounts, extended keys and backend wire records.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_money::Currency;

use crate::address::ScriptType;
use crate::error::AddressError;

// ── Chains and derivation schemes ─────────────────────────────────────────────

/// Key derivation scheme for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationType {
    /// BIP-44, pay-to-pubkey-hash.
    Legacy,
    /// BIP-84, native segwit v0.
    #[serde(alias = "bech32")]
    Segwit,
}

impl DerivationType {
    /// BIP-43 purpose field.
    pub fn purpose(&self) -> u32 {
        match self {
            Self::Legacy => 44,
            Self::Segwit => 84,
        }
    }

    /// Output template used for addresses of this scheme.
    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::Legacy => ScriptType::P2PKH,
            Self::Segwit => ScriptType::P2WPKH,
        }
    }

    /// The scheme whose keys lock outputs of `script_type`.
    pub fn for_script_type(script_type: ScriptType) -> Option<Self> {
        match script_type {
            ScriptType::P2PKH => Some(Self::Legacy),
            ScriptType::P2WPKH => Some(Self::Segwit),
            _ => None,
        }
    }
}

impl fmt::Display for DerivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Segwit => f.write_str("segwit"),
        }
    }
}

/// Chains the engine can derive keys and build transactions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainId {
    Bitcoin,
    BitcoinTestnet,
    Ethereum,
}

impl ChainId {
    /// BIP-44 coin type.
    pub fn coin_type(&self) -> u32 {
        match self {
            Self::Bitcoin => 0,
            Self::BitcoinTestnet => 1,
            Self::Ethereum => 60,
        }
    }

    /// Native currency of the chain.
    pub fn currency(&self) -> Currency {
        match self {
            Self::Bitcoin | Self::BitcoinTestnet => Currency::BTC,
            Self::Ethereum => Currency::ETH,
        }
    }

    /// Ticker used in backend URLs.
    pub fn ticker(&self) -> &'static str {
        match self {
            Self::Bitcoin | Self::BitcoinTestnet => "btc",
            Self::Ethereum => "eth",
        }
    }

    /// Bitcoin network for UTXO chains; `None` for account-model chains.
    pub fn network(&self) -> Option<bitcoin::Network> {
        match self {
            Self::Bitcoin => Some(bitcoin::Network::Bitcoin),
            Self::BitcoinTestnet => Some(bitcoin::Network::Testnet),
            Self::Ethereum => None,
        }
    }

    pub fn is_utxo(&self) -> bool {
        self.network().is_some()
    }

    /// Derivation schemes supported on this chain.
    pub fn derivation_types(&self) -> &'static [DerivationType] {
        match self {
            Self::Bitcoin | Self::BitcoinTestnet => &[DerivationType::Legacy, DerivationType::Segwit],
            Self::Ethereum => &[DerivationType::Legacy],
        }
    }

    /// Scheme used for new receive and change addresses.
    pub fn default_derivation(&self) -> DerivationType {
        match self {
            Self::Bitcoin | Self::BitcoinTestnet => DerivationType::Segwit,
            Self::Ethereum => DerivationType::Legacy,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitcoin => f.write_str("bitcoin"),
            Self::BitcoinTestnet => f.write_str("bitcoin-testnet"),
            Self::Ethereum => f.write_str("ethereum"),
        }
    }
}

/// A single HD account: one chain, one BIP-44 account index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account {
    pub chain: ChainId,
    pub index: u32,
}

impl Account {
    pub fn new(chain: ChainId, index: u32) -> Self {
        Self { chain, index }
    }
}

/// A serialized extended public key tagged with its scheme.
///
/// Ordered and hashable so a `BTreeSet<XPub>` can key repository caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct XPub {
    pub address: String,
    pub derivation: DerivationType,
}

impl XPub {
    pub fn new(address: impl Into<String>, derivation: DerivationType) -> Self {
        Self { address: address.into(), derivation }
    }
}

// ── Backend records ───────────────────────────────────────────────────────────

/// The extended key an unspent output was found under, and the output's
/// path relative to that key (e.g. `M/0/5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XPubRef {
    pub m: String,
    pub path: String,
}

/// An unspent transaction output owned by one of the account's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Transaction id in display (big-endian) byte order.
    #[serde(rename = "tx_hash_big_endian")]
    pub tx_hash: String,
    #[serde(rename = "tx_output_n")]
    pub output_index: u32,
    /// Hex-encoded locking script.
    pub script: String,
    /// Value in satoshi.
    pub value: u64,
    #[serde(default)]
    pub confirmations: u64,
    pub xpub: XPubRef,
}

impl UnspentOutput {
    pub fn script_type(&self) -> Result<ScriptType, AddressError> {
        ScriptType::classify_hex(&self.script)
    }

    pub fn is_segwit(&self) -> bool {
        self.script_type().map(|t| t.is_segwit()).unwrap_or(false)
    }

    /// Path relative to the owning account key.
    pub fn derivation_path(&self) -> &str {
        &self.xpub.path
    }
}

/// Per-xpub activity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressItem {
    #[serde(rename = "address")]
    pub xpub: String,
    /// Next unused receive index.
    #[serde(default)]
    pub account_index: u32,
    /// Next unused change index.
    #[serde(default)]
    pub change_index: u32,
    #[serde(default)]
    pub final_balance: u64,
    #[serde(default)]
    pub n_tx: u64,
}

/// Aggregate activity for a set of xpubs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAddress {
    pub addresses: Vec<AddressItem>,
    pub latest_block_height: u64,
}

impl MultiAddress {
    /// The activity record for `xpub`, if the backend returned one.
    pub fn item_for(&self, xpub: &str) -> Option<&AddressItem> {
        self.addresses.iter().find(|item| item.xpub == xpub)
    }

    /// Sum of `final_balance` across all xpubs.
    pub fn total_balance(&self) -> u64 {
        self.addresses.iter().map(|item| item.final_balance).sum()
    }
}

// ── Fees ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLimits {
    pub min: u64,
    pub max: u64,
}

/// Fee quotes in satoshi per virtual byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    pub regular: u64,
    pub priority: u64,
    pub limits: FeeLimits,
}

/// Which quote to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeLevel {
    #[default]
    Regular,
    Priority,
    /// Caller-chosen rate, clamped to the backend's limits.
    Custom(u64),
}

impl FeeRates {
    pub fn rate_for(&self, level: FeeLevel) -> u64 {
        match level {
            FeeLevel::Regular => self.regular,
            FeeLevel::Priority => self.priority,
            FeeLevel::Custom(rate) => rate.clamp(self.limits.min, self.limits.max.max(self.limits.min)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parameters() {
        assert_eq!(ChainId::Bitcoin.coin_type(), 0);
        assert_eq!(ChainId::BitcoinTestnet.coin_type(), 1);
        assert_eq!(ChainId::Ethereum.coin_type(), 60);
        assert_eq!(ChainId::Bitcoin.default_derivation(), DerivationType::Segwit);
        assert_eq!(ChainId::Ethereum.derivation_types(), &[DerivationType::Legacy]);
        assert!(ChainId::Bitcoin.is_utxo());
        assert!(!ChainId::Ethereum.is_utxo());
        assert_eq!(ChainId::Ethereum.currency(), Currency::ETH);
    }

    #[test]
    fn derivation_purposes() {
        assert_eq!(DerivationType::Legacy.purpose(), 44);
        assert_eq!(DerivationType::Segwit.purpose(), 84);
        assert_eq!(DerivationType::for_script_type(ScriptType::P2WPKH), Some(DerivationType::Segwit));
        assert_eq!(DerivationType::for_script_type(ScriptType::P2TR), None);
    }

    #[test]
    fn xpub_ordering_is_total() {
        let a = XPub::new("xpubA", DerivationType::Legacy);
        let b = XPub::new("xpubA", DerivationType::Segwit);
        let c = XPub::new("xpubB", DerivationType::Legacy);
        let mut v = vec![c.clone(), b.clone(), a.clone()];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn unspent_output_decodes_backend_json() {
        let json = r#"{
            "tx_hash": "ignored",
            "tx_hash_big_endian": "8a3c2a3cbe4d7d8fcf4b8a8e0b2a2f1d3b0a9b8c7d6e5f4a3b2c1d0e0f1a2b3c",
            "tx_output_n": 1,
            "script": "0014751e76e8199196d454941c45d1b3a323f1433bd6",
            "value": 25000,
            "value_hex": "61a8",
            "confirmations": 3,
            "tx_index": 0,
            "xpub": { "m": "xpub6D4n", "path": "M/0/5" }
        }"#;
        let utxo: UnspentOutput = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.value, 25_000);
        assert_eq!(utxo.derivation_path(), "M/0/5");
        assert_eq!(utxo.script_type().unwrap(), ScriptType::P2WPKH);
        assert!(utxo.is_segwit());
    }

    #[test]
    fn multi_address_lookup() {
        let ma = MultiAddress {
            addresses: vec![
                AddressItem { xpub: "a".into(), account_index: 3, change_index: 1, final_balance: 10, n_tx: 2 },
                AddressItem { xpub: "b".into(), account_index: 0, change_index: 0, final_balance: 5, n_tx: 0 },
            ],
            latest_block_height: 800_000,
        };
        assert_eq!(ma.item_for("a").unwrap().account_index, 3);
        assert!(ma.item_for("c").is_none());
        assert_eq!(ma.total_balance(), 15);
    }

    #[test]
    fn fee_level_selection() {
        let rates = FeeRates { regular: 5, priority: 12, limits: FeeLimits { min: 2, max: 50 } };
        assert_eq!(rates.rate_for(FeeLevel::Regular), 5);
        assert_eq!(rates.rate_for(FeeLevel::Priority), 12);
        assert_eq!(rates.rate_for(FeeLevel::Custom(1)), 2);
        assert_eq!(rates.rate_for(FeeLevel::Custom(80)), 50);
        assert_eq!(rates.rate_for(FeeLevel::Custom(20)), 20);
    }
}
