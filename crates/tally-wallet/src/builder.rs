//! Transaction candidates: resolve the destination, pick coins, attach keys.
//!
//! Building is pure. It takes a proposal, the account's keys and a snapshot
//! of the account's unspent outputs and activity, and produces an unsigned
//! [`TransactionCandidate`] that the signer can turn into raw bytes:
//! 1. Resolve the destination address (or the next own receive address)
//! 2. Pick the change address from the default scheme's next change index
//! 3. Run coin selection for the amount, and a sweep for the maximum
//! 4. Pair each selected output with the key that controls it

use bitcoin::{Network, ScriptBuf};
use tally_core::address::{decode_address, DecodedAddress, ScriptType};
use tally_core::constants::{DUST_THRESHOLD, MAX_SUPPLY};
use tally_core::types::{Account, ChainId, MultiAddress, UnspentOutput};
use tally_money::{MoneyError, MoneyValue};
use tracing::debug;

use crate::coin_selection::{CoinSelectionInputs, CoinSelectionTarget, CoinSelector, SortingStrategy};
use crate::error::{ValidationError, WalletError};
use crate::keys::{AccountDerivation, AccountKeyContext, DerivedKey};

/// Where the payment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// An address outside the wallet.
    External(String),
    /// The account's next unused receive address.
    OwnAccount,
}

/// A user's intent to pay.
#[derive(Debug, Clone)]
pub struct TransactionProposal {
    pub account: Account,
    pub destination: Destination,
    pub amount: MoneyValue,
    /// Satoshi per virtual byte.
    pub fee_per_byte: u64,
    pub sorting_strategy: SortingStrategy,
    /// Opaque token forwarded to the backend on broadcast.
    pub lock_secret: Option<String>,
}

impl TransactionProposal {
    pub fn new(account: Account, destination: Destination, amount: MoneyValue, fee_per_byte: u64) -> Self {
        Self {
            account,
            destination,
            amount,
            fee_per_byte,
            sorting_strategy: SortingStrategy::default(),
            lock_secret: None,
        }
    }

    pub fn with_sorting_strategy(mut self, strategy: SortingStrategy) -> Self {
        self.sorting_strategy = strategy;
        self
    }

    pub fn with_lock_secret(mut self, secret: impl Into<String>) -> Self {
        self.lock_secret = Some(secret.into());
        self
    }
}

/// A selected coin and the key that can spend it.
#[derive(Debug, Clone)]
pub struct CandidateInput {
    /// The output being spent.
    pub output: UnspentOutput,
    /// Its classified locking script.
    pub script_type: ScriptType,
    /// Key derived at the output's path.
    pub key: DerivedKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOutput {
    pub address: String,
    pub script_pubkey: ScriptBuf,
    pub script_type: ScriptType,
    /// Satoshi.
    pub value: u64,
}

impl CandidateOutput {
    fn new(decoded: DecodedAddress, value: u64) -> Self {
        Self {
            address: decoded.address,
            script_pubkey: decoded.script_pubkey,
            script_type: decoded.script_type,
            value,
        }
    }
}

/// An unsigned transaction with its fee breakdown.
#[derive(Debug, Clone)]
pub struct TransactionCandidate {
    /// Account the inputs belong to.
    pub account: Account,
    /// Network the addresses were decoded for.
    pub network: Network,
    /// Selected coins in signing order, each with its key.
    pub inputs: Vec<CandidateInput>,
    /// First output: the payment.
    pub destination: CandidateOutput,
    /// Second output, present only when the change is above dust.
    pub change: Option<CandidateOutput>,
    /// Requested payment, in the chain's currency.
    pub amount: MoneyValue,
    /// Inputs minus outputs. The signer refuses a candidate where these
    /// disagree.
    pub fee: MoneyValue,
    /// What a sweep of every worthwhile coin would pay.
    pub max_spendable: MoneyValue,
    /// Fee of that sweep.
    pub fee_for_max: MoneyValue,
    /// Satoshi per virtual byte the fee was computed at.
    pub fee_per_byte: u64,
    /// Opaque token forwarded to the backend on broadcast.
    pub lock_secret: Option<String>,
}

impl TransactionCandidate {
    /// Sum of the spent outputs, or `None` on overflow.
    pub fn total_input(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.output.value))
    }

    /// Destination plus change, or `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.destination.value.checked_add(self.change_value())
    }

    pub fn change_value(&self) -> u64 {
        self.change.as_ref().map_or(0, |c| c.value)
    }
}

/// Largest payable amount and the fee it would cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxSpendable {
    pub amount: MoneyValue,
    pub fee: MoneyValue,
}

fn minor(value: u64, chain: ChainId) -> MoneyValue {
    MoneyValue::from_minor(i128::from(value), chain.currency())
}

/// Non-negative minor units as `u64`, saturating.
fn sat(value: &MoneyValue) -> u64 {
    u64::try_from(value.amount().max(0)).unwrap_or(u64::MAX)
}

fn utxo_network(chain: ChainId) -> Result<Network, WalletError> {
    chain
        .network()
        .ok_or_else(|| WalletError::BuildError(format!("{chain} is not a UTXO chain")))
}

fn next_receive_index(derivation: &AccountDerivation, multi_address: &MultiAddress) -> u32 {
    multi_address
        .item_for(&derivation.xpub())
        .map_or(0, |item| item.account_index)
}

fn next_change_index(derivation: &AccountDerivation, multi_address: &MultiAddress) -> u32 {
    multi_address
        .item_for(&derivation.xpub())
        .map_or(0, |item| item.change_index)
}

/// Builds and validates transaction candidates.
pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Build an unsigned candidate paying `proposal.amount`.
    pub fn build(
        proposal: &TransactionProposal,
        keys: &AccountKeyContext,
        unspent_outputs: &[UnspentOutput],
        multi_address: &MultiAddress,
    ) -> Result<TransactionCandidate, WalletError> {
        if proposal.account != keys.account() {
            return Err(WalletError::BuildError(format!(
                "proposal for {} account {} given keys for {} account {}",
                proposal.account.chain,
                proposal.account.index,
                keys.chain(),
                keys.account().index
            )));
        }
        let chain = keys.chain();
        let network = utxo_network(chain)?;
        if proposal.amount.currency() != chain.currency() {
            return Err(MoneyError::MismatchedCurrency {
                lhs: proposal.amount.currency(),
                rhs: chain.currency(),
            }
            .into());
        }
        let amount = u64::try_from(proposal.amount.amount())
            .map_err(|_| WalletError::InvalidAmount(format!("{} is not a payable amount", proposal.amount)))?;

        let default = keys.default_derivation()?;
        let destination = match &proposal.destination {
            Destination::External(address) => decode_address(address, network)?,
            Destination::OwnAccount => {
                let address = default.receive_address(next_receive_index(default, multi_address))?;
                decode_address(&address, network)?
            }
        };
        let change_address = default.change_address(next_change_index(default, multi_address))?;
        let change_address = decode_address(&change_address, network)?;

        let selection = CoinSelector::select(&CoinSelectionInputs {
            target: CoinSelectionTarget { value: amount, script_type: destination.script_type },
            fee_per_byte: proposal.fee_per_byte,
            unspent_outputs: unspent_outputs.to_vec(),
            sorting_strategy: proposal.sorting_strategy,
            change_output_type: change_address.script_type,
        })?;
        let sweep = CoinSelector::select_all(unspent_outputs, proposal.fee_per_byte, destination.script_type);

        let inputs = selection
            .spendable_outputs
            .iter()
            .map(|utxo| {
                Ok(CandidateInput {
                    output: utxo.clone(),
                    script_type: utxo.script_type()?,
                    key: keys.signing_key_for(utxo)?,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;

        let change = (selection.change > 0).then(|| CandidateOutput::new(change_address, selection.change));

        debug!(
            chain = %chain,
            amount,
            fee = selection.absolute_fee,
            change = selection.change,
            inputs = inputs.len(),
            max_spendable = sweep.amount,
            "builder: candidate built"
        );

        Ok(TransactionCandidate {
            account: proposal.account,
            network,
            inputs,
            destination: CandidateOutput::new(destination, amount),
            change,
            amount: proposal.amount,
            fee: minor(selection.absolute_fee, chain),
            max_spendable: minor(sweep.amount, chain),
            fee_for_max: minor(sweep.absolute_fee, chain),
            fee_per_byte: proposal.fee_per_byte,
            lock_secret: proposal.lock_secret.clone(),
        })
    }

    /// What sweeping every worthwhile coin into one `output_type` output
    /// would pay, and its fee.
    pub fn max_spendable(
        chain: ChainId,
        unspent_outputs: &[UnspentOutput],
        fee_per_byte: u64,
        output_type: ScriptType,
    ) -> MaxSpendable {
        let sweep = CoinSelector::select_all(unspent_outputs, fee_per_byte, output_type);
        MaxSpendable {
            amount: minor(sweep.amount, chain),
            fee: minor(sweep.absolute_fee, chain),
        }
    }

    /// Checks a candidate must pass before it is signed.
    pub fn validate(candidate: &TransactionCandidate) -> Result<(), ValidationError> {
        if !candidate.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        let amount = sat(&candidate.amount);
        if amount < DUST_THRESHOLD {
            return Err(ValidationError::BelowDust { amount, dust: DUST_THRESHOLD });
        }
        if amount > MAX_SUPPLY {
            return Err(ValidationError::AboveMaximumSupply { amount, max: MAX_SUPPLY });
        }
        let fee = sat(&candidate.fee);
        if amount <= fee {
            return Err(ValidationError::BelowFees { amount, fee });
        }
        let max_spendable = sat(&candidate.max_spendable);
        if amount > max_spendable {
            return Err(ValidationError::InsufficientFunds { amount, max_spendable });
        }
        Ok(())
    }

    /// The account's next unused receive address on its default scheme.
    pub fn receive_address(keys: &AccountKeyContext, multi_address: &MultiAddress) -> Result<String, WalletError> {
        let default = keys.default_derivation()?;
        default.receive_address(next_receive_index(default, multi_address))
    }

    /// `count` consecutive receive addresses starting at the next unused
    /// index, for watching incoming payments.
    pub fn addresses_for_sync(
        keys: &AccountKeyContext,
        multi_address: &MultiAddress,
        count: u32,
    ) -> Result<Vec<String>, WalletError> {
        let default = keys.default_derivation()?;
        let start = next_receive_index(default, multi_address);
        (0..count)
            .map(|offset| {
                let index = start
                    .checked_add(offset)
                    .ok_or_else(|| WalletError::KeyDerivation("receive index overflow".into()))?;
                default.receive_address(index)
            })
            .collect()
    }
}
