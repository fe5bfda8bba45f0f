//! Locking-script classification and address decoding.
//!
//! The engine understands five standard output templates. Anything else is
//! rejected at the boundary with a typed [`AddressError`] rather than being
//! guessed at.

use std::fmt;
use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::{Network, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Standard output script templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptType {
    P2PKH,
    /// Pay-to-script-hash. The engine only spends the P2SH-P2WPKH form.
    P2SH,
    P2WPKH,
    P2WSH,
    P2TR,
}

impl ScriptType {
    /// Whether spending this output type carries witness data.
    pub fn is_segwit(&self) -> bool {
        !matches!(self, Self::P2PKH)
    }

    /// Classify a raw locking script.
    pub fn classify(script: &[u8]) -> Option<Self> {
        match script {
            [0x76, 0xa9, 0x14, hash @ .., 0x88, 0xac] if hash.len() == 20 => Some(Self::P2PKH),
            [0xa9, 0x14, hash @ .., 0x87] if hash.len() == 20 => Some(Self::P2SH),
            [0x00, 0x14, program @ ..] if program.len() == 20 => Some(Self::P2WPKH),
            [0x00, 0x20, program @ ..] if program.len() == 32 => Some(Self::P2WSH),
            [0x51, 0x20, program @ ..] if program.len() == 32 => Some(Self::P2TR),
            _ => None,
        }
    }

    /// Classify a hex-encoded locking script as returned by chain backends.
    pub fn classify_hex(script_hex: &str) -> Result<Self, AddressError> {
        let bytes = hex::decode(script_hex.trim())
            .map_err(|e| AddressError::InvalidScriptHex(e.to_string()))?;
        Self::classify(&bytes).ok_or_else(|| AddressError::UnsupportedScript(script_hex.to_string()))
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::P2PKH => "p2pkh",
            Self::P2SH => "p2sh",
            Self::P2WPKH => "p2wpkh",
            Self::P2WSH => "p2wsh",
            Self::P2TR => "p2tr",
        };
        f.write_str(name)
    }
}

// ── Script templates ──────────────────────────────────────────────────────────

/// HASH160 of a serialized public key or script.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> ScriptBuf {
    let mut bytes = Vec::with_capacity(25);
    bytes.extend_from_slice(&[0x76, 0xa9, 0x14]);
    bytes.extend_from_slice(pubkey_hash);
    bytes.extend_from_slice(&[0x88, 0xac]);
    ScriptBuf::from_bytes(bytes)
}

/// `OP_0 <hash>`
pub fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> ScriptBuf {
    let mut bytes = Vec::with_capacity(22);
    bytes.extend_from_slice(&[0x00, 0x14]);
    bytes.extend_from_slice(pubkey_hash);
    ScriptBuf::from_bytes(bytes)
}

/// `OP_HASH160 <hash> OP_EQUAL`
pub fn p2sh_script(script_hash: &[u8; 20]) -> ScriptBuf {
    let mut bytes = Vec::with_capacity(23);
    bytes.extend_from_slice(&[0xa9, 0x14]);
    bytes.extend_from_slice(script_hash);
    bytes.push(0x87);
    ScriptBuf::from_bytes(bytes)
}

// ── Address decoding ──────────────────────────────────────────────────────────

/// A payment address resolved to its locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub address: String,
    pub script_pubkey: ScriptBuf,
    pub script_type: ScriptType,
}

/// Decode a base58 or bech32 bitcoin address for `network`.
///
/// Empty input, unparsable strings, addresses for another network and
/// non-standard programs are all typed errors.
pub fn decode_address(address: &str, network: Network) -> Result<DecodedAddress, AddressError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let unchecked = bitcoin::Address::<NetworkUnchecked>::from_str(address)
        .map_err(|_| AddressError::UnsupportedFormat(address.to_string()))?;
    let checked = unchecked
        .require_network(network)
        .map_err(|_| AddressError::UnsupportedFormat(address.to_string()))?;
    let script_pubkey = checked.script_pubkey();
    let script_type = ScriptType::classify(script_pubkey.as_bytes())
        .ok_or_else(|| AddressError::UnsupportedFormat(address.to_string()))?;
    Ok(DecodedAddress {
        address: address.to_string(),
        script_pubkey,
        script_type,
    })
}

/// Parse a `0x`-prefixed, 20-byte account address.
pub fn parse_evm_address(address: &str) -> Result<[u8; 20], AddressError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| AddressError::UnsupportedFormat(address.to_string()))?;
    let bytes = hex::decode(digits).map_err(|_| AddressError::UnsupportedFormat(address.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| AddressError::UnsupportedFormat(address.to_string()))
}
