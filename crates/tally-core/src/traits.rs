//! Trait interfaces between the engine and its collaborators.
//!
//! - [`MnemonicProvider`]: supplies the recovery phrase on demand (the host
//!   application implements it, usually behind a secure store)
//! - [`UnspentOutputsClient`], [`MultiAddressClient`], [`FeeClient`],
//!   [`BroadcastClient`]: chain data backend (tally-network implements)

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::{CredentialError, NetworkError};
use crate::types::{ChainId, FeeRates, MultiAddress, UnspentOutput, XPub};

/// Source of the wallet's recovery phrase.
///
/// The phrase is requested each time keys are derived and is never retained
/// by the engine.
#[async_trait]
pub trait MnemonicProvider: Send + Sync {
    async fn mnemonic(&self) -> Result<Zeroizing<String>, CredentialError>;

    /// Optional BIP-39 passphrase. Defaults to none.
    async fn passphrase(&self) -> Result<Zeroizing<String>, CredentialError> {
        Ok(Zeroizing::new(String::new()))
    }
}

/// Fetches unspent outputs for a set of extended public keys.
#[async_trait]
pub trait UnspentOutputsClient: Send + Sync {
    async fn unspent_outputs(&self, xpubs: &[XPub]) -> Result<Vec<UnspentOutput>, NetworkError>;
}

/// Fetches per-xpub activity (next indices, balances).
#[async_trait]
pub trait MultiAddressClient: Send + Sync {
    async fn multi_address(&self, xpubs: &[XPub]) -> Result<MultiAddress, NetworkError>;
}

/// Fetches current fee quotes.
#[async_trait]
pub trait FeeClient: Send + Sync {
    async fn fees(&self, chain: ChainId) -> Result<FeeRates, NetworkError>;
}

/// Submits a signed transaction.
#[async_trait]
pub trait BroadcastClient: Send + Sync {
    /// Push hex-encoded transaction bytes. Returns the hash reported by the
    /// backend.
    async fn push_transaction(
        &self,
        encoded: &str,
        lock_secret: Option<&str>,
    ) -> Result<String, NetworkError>;
}
