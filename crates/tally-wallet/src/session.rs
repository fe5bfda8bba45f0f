//! A wallet session: the explicit owner of everything a signed-in wallet
//! needs.
//!
//! The session holds the credential source, the repositories and the
//! broadcaster for as long as the user is signed in. Keys are derived from
//! the mnemonic on every use and dropped afterwards. Derivation and signing
//! are CPU-bound and run on the blocking pool.

use std::sync::Arc;

use tally_core::traits::{BroadcastClient, MnemonicProvider};
use tally_core::types::{Account, ChainId, DerivationType, FeeLevel};
use tally_money::MoneyValue;
use tally_network::{FeeRepository, UtxoRepository};
use tracing::{debug, info};

use crate::broadcaster::Broadcaster;
use crate::builder::{Destination, MaxSpendable, TransactionBuilder, TransactionCandidate, TransactionProposal};
use crate::config::EngineConfig;
use crate::error::WalletError;
use crate::evm::{self, EvmTransaction};
use crate::keys::AccountKeyContext;
use crate::signer::{SignedTransaction, TransactionSigner};

async fn blocking<T, F>(f: F) -> Result<T, WalletError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, WalletError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletError::Task(e.to_string()))?
}

pub struct WalletSession {
    config: EngineConfig,
    credentials: Arc<dyn MnemonicProvider>,
    utxos: Arc<UtxoRepository>,
    fees: Arc<FeeRepository>,
    broadcaster: Broadcaster,
}

impl WalletSession {
    pub fn new(
        config: EngineConfig,
        credentials: Arc<dyn MnemonicProvider>,
        utxos: Arc<UtxoRepository>,
        fees: Arc<FeeRepository>,
        broadcast_client: Arc<dyn BroadcastClient>,
    ) -> Self {
        Self {
            config,
            credentials,
            utxos,
            fees,
            broadcaster: Broadcaster::new(broadcast_client),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Derive every scheme's account node for `account`.
    pub async fn account_keys(&self, account: Account) -> Result<AccountKeyContext, WalletError> {
        let phrase = self.credentials.mnemonic().await?;
        let passphrase = self.credentials.passphrase().await?;
        blocking(move || AccountKeyContext::from_mnemonic(&phrase, &passphrase, account)).await
    }

    /// The next unused receive address.
    pub async fn receive_address(&self, account: Account) -> Result<String, WalletError> {
        let keys = self.account_keys(account).await?;
        let activity = self.utxos.multi_address(&keys.xpubs(), false).await?;
        TransactionBuilder::receive_address(&keys, &activity)
    }

    /// The configured number of receive addresses from the next unused one.
    pub async fn addresses_for_sync(&self, account: Account) -> Result<Vec<String>, WalletError> {
        let keys = self.account_keys(account).await?;
        let activity = self.utxos.multi_address(&keys.xpubs(), false).await?;
        TransactionBuilder::addresses_for_sync(&keys, &activity, self.config.sync_lookahead)
    }

    /// Fee rate for `level`, or the configured default level.
    pub async fn fee_per_byte(&self, chain: ChainId, level: Option<FeeLevel>) -> Result<u64, WalletError> {
        let rates = self.fees.fees(chain).await?;
        Ok(rates.rate_for(level.unwrap_or(self.config.default_fee_level)))
    }

    /// Build a candidate at the given fee level with the configured coin
    /// ordering.
    pub async fn propose(
        &self,
        account: Account,
        destination: Destination,
        amount: MoneyValue,
        level: Option<FeeLevel>,
    ) -> Result<TransactionCandidate, WalletError> {
        let fee_per_byte = self.fee_per_byte(account.chain, level).await?;
        let proposal = TransactionProposal::new(account, destination, amount, fee_per_byte)
            .with_sorting_strategy(self.config.sorting_strategy);
        self.build_candidate(proposal).await
    }

    /// Build a candidate against cached unspent outputs and activity.
    pub async fn build_candidate(&self, proposal: TransactionProposal) -> Result<TransactionCandidate, WalletError> {
        let keys = self.account_keys(proposal.account).await?;
        let (unspent, activity) = self.utxos.fetch(&keys.xpubs(), false).await?;
        debug!(outputs = unspent.len(), fee_per_byte = proposal.fee_per_byte, "session: building candidate");
        blocking(move || TransactionBuilder::build(&proposal, &keys, &unspent, &activity)).await
    }

    /// What a sweep to the account's default address type would pay.
    pub async fn max_spendable(&self, account: Account, level: Option<FeeLevel>) -> Result<MaxSpendable, WalletError> {
        let keys = self.account_keys(account).await?;
        let fee_per_byte = self.fee_per_byte(account.chain, level).await?;
        let unspent = self.utxos.unspent_outputs(&keys.xpubs(), false).await?;
        let output_type = account.chain.default_derivation().script_type();
        Ok(TransactionBuilder::max_spendable(account.chain, &unspent, fee_per_byte, output_type))
    }

    /// Validate and sign.
    pub async fn sign(&self, candidate: TransactionCandidate) -> Result<SignedTransaction, WalletError> {
        TransactionBuilder::validate(&candidate)?;
        blocking(move || Ok(TransactionSigner::sign(&candidate)?)).await
    }

    /// Sign an account-model transfer with the account's first key.
    pub async fn sign_evm(&self, account: Account, tx: EvmTransaction) -> Result<SignedTransaction, WalletError> {
        if account.chain.is_utxo() {
            return Err(WalletError::BuildError(format!("{} is not an account-model chain", account.chain)));
        }
        let keys = self.account_keys(account).await?;
        blocking(move || {
            let key = keys.derivation(DerivationType::Legacy)?.receive_private_key(0)?;
            Ok(evm::sign(&tx, &key)?)
        })
        .await
    }

    /// Broadcast and forget cached outputs, which now include spent ones.
    ///
    /// Only UTXO-chain transactions can be pushed; the backend has no
    /// account-model endpoint. See [`Broadcaster::send`] on retrying.
    pub async fn send(&self, signed: &SignedTransaction, lock_secret: Option<&str>) -> Result<String, WalletError> {
        if !signed.chain.is_utxo() {
            return Err(WalletError::UnsupportedChain(signed.chain.to_string()));
        }
        let txid = self.broadcaster.send(signed, lock_secret).await?;
        self.utxos.invalidate_all();
        Ok(txid)
    }

    /// Drop every cached response.
    pub fn logout(&self) {
        self.utxos.invalidate_all();
        self.fees.invalidate_all();
        info!("session: logged out");
    }
}
