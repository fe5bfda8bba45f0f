//! Shared helpers: an in-memory backend and owned-output factories.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use tally_core::address::ScriptType;
use tally_core::error::{CredentialError, NetworkError};
use tally_core::traits::{BroadcastClient, FeeClient, MnemonicProvider, MultiAddressClient, UnspentOutputsClient};
use tally_core::types::{ChainId, DerivationType, FeeLimits, FeeRates, MultiAddress, UnspentOutput, XPub, XPubRef};
use tally_network::{FeeRepository, UtxoRepository};
use tally_wallet::{AccountKeyContext, EngineConfig, WalletSession};
use zeroize::Zeroizing;

pub const ABOUT: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// First BIP-84 receive addresses of [`ABOUT`] on mainnet.
pub const ABOUT_RECEIVE_0: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
pub const ABOUT_RECEIVE_1: &str = "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g";

/// A fixed recovery phrase.
pub struct StaticMnemonic(pub &'static str);

#[async_trait]
impl MnemonicProvider for StaticMnemonic {
    async fn mnemonic(&self) -> Result<Zeroizing<String>, CredentialError> {
        Ok(Zeroizing::new(self.0.to_string()))
    }
}

/// In-memory chain backend that counts calls and records pushed
/// transactions.
pub struct MockBackend {
    pub utxos: Mutex<Vec<UnspentOutput>>,
    pub activity: Mutex<MultiAddress>,
    pub rates: FeeRates,
    pub latency: Duration,
    pub unspent_calls: AtomicUsize,
    pub multi_address_calls: AtomicUsize,
    pub fee_calls: AtomicUsize,
    pub pushed: Mutex<Vec<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            utxos: Mutex::new(Vec::new()),
            activity: Mutex::new(MultiAddress::default()),
            rates: FeeRates { regular: 10, priority: 25, limits: FeeLimits { min: 1, max: 500 } },
            latency: Duration::ZERO,
            unspent_calls: AtomicUsize::new(0),
            multi_address_calls: AtomicUsize::new(0),
            fee_calls: AtomicUsize::new(0),
            pushed: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn with_utxos(utxos: Vec<UnspentOutput>) -> Arc<Self> {
        Arc::new(Self { utxos: Mutex::new(utxos), ..Self::default() })
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl UnspentOutputsClient for MockBackend {
    async fn unspent_outputs(&self, _: &[XPub]) -> Result<Vec<UnspentOutput>, NetworkError> {
        self.unspent_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        Ok(self.utxos.lock().clone())
    }
}

#[async_trait]
impl MultiAddressClient for MockBackend {
    async fn multi_address(&self, _: &[XPub]) -> Result<MultiAddress, NetworkError> {
        self.multi_address_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        Ok(self.activity.lock().clone())
    }
}

#[async_trait]
impl FeeClient for MockBackend {
    async fn fees(&self, _: ChainId) -> Result<FeeRates, NetworkError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rates)
    }
}

#[async_trait]
impl BroadcastClient for MockBackend {
    async fn push_transaction(&self, encoded: &str, _: Option<&str>) -> Result<String, NetworkError> {
        let bytes = hex::decode(encoded).map_err(|e| NetworkError::Decode(e.to_string()))?;
        let tx: bitcoin::Transaction =
            bitcoin::consensus::deserialize(&bytes).map_err(|e| NetworkError::Decode(e.to_string()))?;
        self.pushed.lock().push(encoded.to_string());
        Ok(tx.txid().to_string())
    }
}

/// A session over `backend` using the [`ABOUT`] phrase.
pub fn session(backend: &Arc<MockBackend>, config: EngineConfig) -> WalletSession {
    let utxos = Arc::new(UtxoRepository::new(backend.clone(), backend.clone(), &config.cache));
    let fees = Arc::new(FeeRepository::new(backend.clone(), &config.cache));
    WalletSession::new(config, Arc::new(StaticMnemonic(ABOUT)), utxos, fees, backend.clone())
}

/// An output paying the receive key at `index` of `derivation`, locked with
/// `script_type`.
pub fn owned_utxo(
    keys: &AccountKeyContext,
    derivation: DerivationType,
    script_type: ScriptType,
    index: u32,
    value: u64,
) -> anyhow::Result<UnspentOutput> {
    let scheme = keys.derivation(derivation)?;
    let key = scheme.receive_private_key(index)?;
    let script = key
        .locking_script(script_type)
        .with_context(|| format!("no single-key script for {script_type}"))?;
    Ok(UnspentOutput {
        tx_hash: format!("{:02x}{:062x}", u8::from(derivation == DerivationType::Segwit), index),
        output_index: index,
        script: hex::encode(script.as_bytes()),
        value,
        confirmations: 1,
        xpub: XPubRef { m: scheme.xpub(), path: format!("M/0/{index}") },
    })
}
