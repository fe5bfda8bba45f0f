//! Wallet error types.

use tally_core::error::{AddressError, CredentialError, NetworkError};
use tally_money::MoneyError;
use thiserror::Error;

/// Coin selection failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinSelectionError {
    /// The candidate set was empty.
    #[error("no coins to select")]
    NoCoinsToSelect,

    /// The target was already met before any coin was taken.
    #[error("no coins selected")]
    NoSelectedCoins,

    /// Every usable coin was taken and the target plus fee is still not met.
    #[error("insufficient funds: available {available}, required {required} (fee {fee})")]
    InsufficientFunds {
        /// Sum of all candidate coins, in satoshi.
        available: u64,
        /// Target plus fee, in satoshi.
        required: u64,
        /// Fee at the point selection ran out of coins, in satoshi.
        fee: u64,
    },
}

/// Transaction signing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Secp256k1 operation failed.
    #[error("secp256k1: {0}")]
    Secp(String),

    /// Sighash computation failed.
    #[error("sighash: {0}")]
    Sighash(String),

    /// The derived key does not control the output being spent.
    #[error("key does not match script of input {index}")]
    KeyMismatch { index: usize },

    /// Malformed previous outpoint.
    #[error("invalid outpoint: {0}")]
    InvalidOutpoint(String),

    /// The input's script template cannot be signed by this engine.
    #[error("cannot sign {script_type} input {index}")]
    UnsupportedInput { index: usize, script_type: String },

    /// Inputs do not cover outputs.
    #[error("inputs {inputs} do not cover outputs {outputs}")]
    ValueMismatch { inputs: u64, outputs: u64 },

    /// Input or output values overflow a u64 when summed.
    #[error("transaction values overflow")]
    ValueOverflow,

    /// Inputs minus outputs differ from the fee the candidate declares.
    #[error("candidate declares fee {expected} but pays {actual}")]
    FeeMismatch { expected: i128, actual: u64 },

    /// The fee does not pay for the transaction's size at its fee rate.
    #[error("fee {fee} is below {required} required at the candidate's rate")]
    FeeBelowRate { fee: u64, required: u64 },

    /// RLP or script encoding failed.
    #[error("encoding: {0}")]
    Encoding(String),
}

/// Pre-signing checks on a candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("amount {amount} is below the dust threshold {dust}")]
    BelowDust { amount: u64, dust: u64 },

    #[error("amount {amount} exceeds the maximum supply {max}")]
    AboveMaximumSupply { amount: u64, max: u64 },

    #[error("amount {amount} does not cover the fee {fee}")]
    BelowFees { amount: u64, fee: u64 },

    #[error("amount {amount} exceeds the spendable balance {max_spendable}")]
    InsufficientFunds { amount: u64, max_spendable: u64 },
}

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// No key in the account matches an output's owner.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The chain does not support the requested derivation scheme.
    #[error("{derivation} derivation is not supported on {chain}")]
    UnsupportedDerivation { chain: String, derivation: String },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The chain has no broadcast endpoint on this backend.
    #[error("broadcasting {0} transactions is not supported")]
    UnsupportedChain(String),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task: {0}")]
    Task(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    CoinSelection(#[from] CoinSelectionError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = CoinSelectionError::InsufficientFunds {
            available: 100,
            required: 250,
            fee: 50,
        };
        assert_eq!(
            e.to_string(),
            "insufficient funds: available 100, required 250 (fee 50)"
        );
    }

    #[test]
    fn display_key_mismatch() {
        let e = SigningError::KeyMismatch { index: 2 };
        assert_eq!(e.to_string(), "key does not match script of input 2");
    }

    #[test]
    fn display_validation() {
        let e = ValidationError::BelowDust { amount: 100, dust: 546 };
        assert_eq!(e.to_string(), "amount 100 is below the dust threshold 546");
    }

    #[test]
    fn from_coin_selection_error() {
        let wallet: WalletError = CoinSelectionError::NoCoinsToSelect.into();
        assert_eq!(wallet, WalletError::CoinSelection(CoinSelectionError::NoCoinsToSelect));
        assert_eq!(wallet.to_string(), "no coins to select");
    }

    #[test]
    fn from_address_error() {
        let wallet: WalletError = AddressError::Empty.into();
        assert_eq!(wallet, WalletError::Address(AddressError::Empty));
    }

    #[test]
    fn from_network_error() {
        let wallet: WalletError = NetworkError::Timeout.into();
        assert_eq!(wallet.to_string(), "timeout");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::InvalidAmount("negative".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
