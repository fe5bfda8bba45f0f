//! Turn a candidate into a fully signed, serialized transaction.
//!
//! Inputs are signed in candidate order with deterministic (RFC 6979) ECDSA
//! and `SIGHASH_ALL`, so signing the same candidate twice yields the same
//! bytes and the same txid:
//! - P2PKH: legacy sighash, signature and key in the scriptSig
//! - P2WPKH: BIP-143 sighash, signature and key in the witness
//! - P2SH-P2WPKH: BIP-143 sighash, redeem script in the scriptSig, witness
//!   as for P2WPKH

use std::str::FromStr;

use bitcoin::blockdata::script::PushBytesBuf;
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1, Signing};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    absolute, transaction, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use tally_core::address::{p2pkh_script, p2wpkh_script, ScriptType};
use tally_core::types::ChainId;
use tally_money::MoneyValue;

use crate::builder::{CandidateInput, TransactionCandidate};
use crate::error::SigningError;
use crate::keys::DerivedKey;
use crate::size::TransactionSizeCalculator;

/// A transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub chain: ChainId,
    pub raw: Vec<u8>,
    /// Hex of `raw`, as submitted to the backend.
    pub encoded: String,
    pub txid: String,
    /// Serialized size in bytes.
    pub size: usize,
    /// Virtual size in vbytes. Equal to `size` for account-model chains.
    pub vsize: usize,
    pub fee: MoneyValue,
}

/// The unlocking data for one input.
struct Unlock {
    script_sig: ScriptBuf,
    witness: Witness,
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf, SigningError> {
    PushBytesBuf::try_from(bytes).map_err(|e| SigningError::Encoding(e.to_string()))
}

/// DER signature with the sighash byte appended.
fn ecdsa_sign<C: Signing>(
    secp: &Secp256k1<C>,
    digest: [u8; 32],
    key: &DerivedKey,
) -> Vec<u8> {
    let sig = secp.sign_ecdsa(&Message::from_digest(digest), key.secret_key());
    bitcoin::ecdsa::Signature { sig, hash_ty: EcdsaSighashType::All }.to_vec()
}

fn check_owner(index: usize, input: &CandidateInput) -> Result<(), SigningError> {
    let expected = input.key.locking_script(input.script_type).ok_or_else(|| {
        SigningError::UnsupportedInput {
            index,
            script_type: input.script_type.to_string(),
        }
    })?;
    let actual = hex::decode(&input.output.script).map_err(|e| SigningError::Encoding(e.to_string()))?;
    if expected.as_bytes() != actual.as_slice() {
        return Err(SigningError::KeyMismatch { index });
    }
    Ok(())
}

/// The implied fee must be the declared one and pay for the size model at
/// the candidate's rate.
fn check_fee(candidate: &TransactionCandidate, fee: u64) -> Result<(), SigningError> {
    let expected = candidate.fee.amount();
    if i128::from(fee) != expected {
        return Err(SigningError::FeeMismatch { expected, actual: fee });
    }
    let inputs: Vec<ScriptType> = candidate.inputs.iter().map(|i| i.script_type).collect();
    let mut outputs = vec![candidate.destination.script_type];
    outputs.extend(candidate.change.as_ref().map(|c| c.script_type));
    let required = TransactionSizeCalculator::fee(&inputs, &outputs, candidate.fee_per_byte);
    if fee < required {
        return Err(SigningError::FeeBelowRate { fee, required });
    }
    Ok(())
}

fn unsigned_transaction(candidate: &TransactionCandidate) -> Result<Transaction, SigningError> {
    let input = candidate
        .inputs
        .iter()
        .map(|i| {
            let txid = Txid::from_str(&i.output.tx_hash)
                .map_err(|_| SigningError::InvalidOutpoint(i.output.tx_hash.clone()))?;
            Ok(TxIn {
                previous_output: OutPoint::new(txid, i.output.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
        })
        .collect::<Result<Vec<_>, SigningError>>()?;

    let mut output = vec![TxOut {
        value: Amount::from_sat(candidate.destination.value),
        script_pubkey: candidate.destination.script_pubkey.clone(),
    }];
    if let Some(change) = &candidate.change {
        output.push(TxOut {
            value: Amount::from_sat(change.value),
            script_pubkey: change.script_pubkey.clone(),
        });
    }

    Ok(Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input,
        output,
    })
}

/// Signs UTXO-chain candidates.
pub struct TransactionSigner;

impl TransactionSigner {
    pub fn sign(candidate: &TransactionCandidate) -> Result<SignedTransaction, SigningError> {
        let inputs = candidate.total_input().ok_or(SigningError::ValueOverflow)?;
        let outputs = candidate.total_output().ok_or(SigningError::ValueOverflow)?;
        let fee = inputs
            .checked_sub(outputs)
            .ok_or(SigningError::ValueMismatch { inputs, outputs })?;
        check_fee(candidate, fee)?;

        for (index, input) in candidate.inputs.iter().enumerate() {
            check_owner(index, input)?;
        }

        let mut tx = unsigned_transaction(candidate)?;
        let secp = Secp256k1::signing_only();

        let unlocks = {
            let mut cache = SighashCache::new(&tx);
            candidate
                .inputs
                .iter()
                .enumerate()
                .map(|(index, input)| Self::unlock(&secp, &mut cache, index, input))
                .collect::<Result<Vec<_>, SigningError>>()?
        };
        for (txin, unlock) in tx.input.iter_mut().zip(unlocks) {
            txin.script_sig = unlock.script_sig;
            txin.witness = unlock.witness;
        }

        let raw = serialize(&tx);
        Ok(SignedTransaction {
            chain: candidate.account.chain,
            encoded: hex::encode(&raw),
            txid: tx.txid().to_string(),
            size: raw.len(),
            vsize: tx.vsize(),
            fee: MoneyValue::from_minor(i128::from(fee), candidate.amount.currency()),
            raw,
        })
    }

    fn unlock<C: Signing>(
        secp: &Secp256k1<C>,
        cache: &mut SighashCache<&Transaction>,
        index: usize,
        input: &CandidateInput,
    ) -> Result<Unlock, SigningError> {
        let key = &input.key;
        let public = key.public_key();
        let pubkey_hash = key.pubkey_hash();
        match input.script_type {
            ScriptType::P2PKH => {
                let script_pubkey = p2pkh_script(&pubkey_hash);
                let sighash = cache
                    .legacy_signature_hash(index, &script_pubkey, EcdsaSighashType::All.to_u32())
                    .map_err(|e| SigningError::Sighash(e.to_string()))?;
                let sig = ecdsa_sign(secp, sighash.to_byte_array(), key);
                let script_sig = ScriptBuf::builder()
                    .push_slice(push_bytes(sig)?)
                    .push_key(&public)
                    .into_script();
                Ok(Unlock { script_sig, witness: Witness::new() })
            }
            ScriptType::P2WPKH | ScriptType::P2SH => {
                let script_code = p2pkh_script(&pubkey_hash);
                let sighash = cache
                    .segwit_signature_hash(
                        index,
                        &script_code,
                        Amount::from_sat(input.output.value),
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| SigningError::Sighash(e.to_string()))?;
                let sig = ecdsa_sign(secp, sighash.to_byte_array(), key);
                let mut witness = Witness::new();
                witness.push(sig);
                witness.push(public.to_bytes());
                let script_sig = if input.script_type == ScriptType::P2SH {
                    let redeem = p2wpkh_script(&pubkey_hash);
                    ScriptBuf::builder()
                        .push_slice(push_bytes(redeem.to_bytes())?)
                        .into_script()
                } else {
                    ScriptBuf::new()
                };
                Ok(Unlock { script_sig, witness })
            }
            ScriptType::P2WSH | ScriptType::P2TR => Err(SigningError::UnsupportedInput {
                index,
                script_type: input.script_type.to_string(),
            }),
        }
    }
}
