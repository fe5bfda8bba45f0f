//! # tally-wallet: keys, coin selection, building and signing.
//!
//! Derives BIP-44/BIP-84 account keys from a BIP-39 mnemonic, selects coins
//! with a fee-aware greedy strategy, builds unsigned transaction candidates,
//! signs them for UTXO and account-model chains, and broadcasts the result.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` and the per-stage error enums
//! - [`mnemonic`]: phrase parsing, seed stretching, generation
//! - [`keys`]: Seed, account derivation, per-output signing keys
//! - [`size`]: transaction weight and fee model
//! - [`coin_selection`]: ascending/descending greedy selection and sweeps
//! - [`builder`]: proposals, candidates, validation
//! - [`signer`]: legacy, native and nested segwit signing
//! - [`evm`]: EIP-55 addresses and EIP-155 signing
//! - [`broadcaster`]: submission with txid check
//! - [`config`]: `EngineConfig`
//! - [`session`]: `WalletSession`, the async entry point

pub mod broadcaster;
pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod error;
pub mod evm;
pub mod keys;
pub mod mnemonic;
pub mod session;
pub mod signer;
pub mod size;

pub use broadcaster::Broadcaster;
pub use builder::{
    CandidateInput, CandidateOutput, Destination, MaxSpendable, TransactionBuilder, TransactionCandidate,
    TransactionProposal,
};
pub use coin_selection::{
    CoinSelectionInputs, CoinSelectionTarget, CoinSelector, SortingStrategy, SpendableUnspentOutputs,
};
pub use config::EngineConfig;
pub use error::{CoinSelectionError, SigningError, ValidationError, WalletError};
pub use evm::EvmTransaction;
pub use keys::{AccountDerivation, AccountKeyContext, DerivedKey, Seed};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, parse_mnemonic};
pub use session::WalletSession;
pub use signer::{SignedTransaction, TransactionSigner};
pub use size::TransactionSizeCalculator;
