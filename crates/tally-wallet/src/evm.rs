//! Account-model (Ethereum) addresses and legacy EIP-155 transactions.

use bitcoin::secp256k1::PublicKey;
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use tally_core::constants::ETHEREUM_TRANSFER_GAS;
use tally_core::address::parse_evm_address;
use tally_core::error::AddressError;
use tally_core::types::ChainId;
use tally_money::{Currency, MoneyValue};

use crate::error::SigningError;
use crate::keys::DerivedKey;
use crate::signer::SignedTransaction;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// EIP-55 mixed-case encoding of a 20-byte address.
pub fn to_checksum(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Address of a secp256k1 public key: the last 20 bytes of the keccak hash
/// of its uncompressed coordinates.
pub fn checksum_address(public: &PublicKey) -> String {
    let uncompressed = public.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    to_checksum(&address)
}

/// Minimal big-endian bytes; zero encodes as the empty string.
fn be_trimmed(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn uint(value: u128) -> Vec<u8> {
    be_trimmed(&value.to_be_bytes())
}

/// A legacy (pre-EIP-1559) transaction with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub nonce: u64,
    /// Wei per gas.
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    /// Wei.
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl EvmTransaction {
    /// A plain value transfer.
    pub fn transfer(
        nonce: u64,
        to: &str,
        value: u128,
        gas_price: u128,
        chain_id: u64,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            nonce,
            gas_price,
            gas_limit: ETHEREUM_TRANSFER_GAS,
            to: parse_evm_address(to)?,
            value,
            data: Vec::new(),
            chain_id,
        })
    }

    /// Most the transaction can cost in fees, in wei.
    pub fn max_fee(&self) -> Option<u128> {
        self.gas_price.checked_mul(u128::from(self.gas_limit))
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&uint(u128::from(self.nonce)));
        stream.append(&uint(self.gas_price));
        stream.append(&uint(u128::from(self.gas_limit)));
        stream.append(&self.to.to_vec());
        stream.append(&uint(self.value));
        stream.append(&self.data);
    }

    /// `keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))`
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&uint(u128::from(self.chain_id)));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        keccak256(&stream.out())
    }
}

/// Sign with recoverable ECDSA and encode `rlp([..fields, v, r, s])`.
pub fn sign(tx: &EvmTransaction, key: &DerivedKey) -> Result<SignedTransaction, SigningError> {
    let signing_key = SigningKey::from_slice(&key.secret_key().secret_bytes())
        .map_err(|e| SigningError::Secp(e.to_string()))?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&tx.signing_hash())
        .map_err(|e| SigningError::Secp(e.to_string()))?;
    let v = tx
        .chain_id
        .checked_mul(2)
        .and_then(|c| c.checked_add(35 + u64::from(recovery_id.to_byte())))
        .ok_or_else(|| SigningError::Encoding(format!("chain id {} out of range", tx.chain_id)))?;
    let rs = signature.to_bytes();

    let mut stream = RlpStream::new_list(9);
    tx.append_fields(&mut stream);
    stream.append(&uint(u128::from(v)));
    stream.append(&be_trimmed(&rs[..32]));
    stream.append(&be_trimmed(&rs[32..]));
    let raw = stream.out().to_vec();

    let fee = tx
        .max_fee()
        .and_then(|f| i128::try_from(f).ok())
        .ok_or_else(|| SigningError::Encoding("fee overflows".into()))?;

    Ok(SignedTransaction {
        chain: ChainId::Ethereum,
        encoded: format!("0x{}", hex::encode(&raw)),
        txid: format!("0x{}", hex::encode(keccak256(&raw))),
        size: raw.len(),
        vsize: raw.len(),
        fee: MoneyValue::from_minor(fee, Currency::ETH),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::DerivationPath;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    fn eip155_key() -> DerivedKey {
        let secret = SecretKey::from_slice(&[0x46; 32]).unwrap();
        DerivedKey::new(&Secp256k1::new(), secret, DerivationPath::master())
    }

    fn eip155_tx() -> EvmTransaction {
        EvmTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: [0x35; 20],
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_tx().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn eip155_signed_transaction() {
        let signed = sign(&eip155_tx(), &eip155_key()).unwrap();
        assert_eq!(
            signed.encoded,
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a7640000\
             8025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d899\
             7f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.txid, format!("0x{}", hex::encode(keccak256(&signed.raw))));
        assert_eq!(signed.size, 110);
        assert_eq!(signed.fee, MoneyValue::from_minor(420_000_000_000_000, Currency::ETH));
    }

    #[test]
    fn eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let bytes = parse_evm_address(expected).unwrap();
            assert_eq!(to_checksum(&bytes), expected);
        }
    }

    #[test]
    fn transfer_parses_destination() {
        let tx = EvmTransaction::transfer(0, "0x3535353535353535353535353535353535353535", 5, 1, 1).unwrap();
        assert_eq!(tx.to, [0x35; 20]);
        assert_eq!(tx.gas_limit, 21_000);
        assert!(EvmTransaction::transfer(0, "0x1234", 5, 1, 1).is_err());
        assert_eq!(EvmTransaction::transfer(0, "", 5, 1, 1).unwrap_err(), AddressError::Empty);
    }

    #[test]
    fn trimmed_integers() {
        assert!(uint(0).is_empty());
        assert_eq!(uint(0x5208), vec![0x52, 0x08]);
        assert_eq!(be_trimmed(&[0, 0, 1, 0]), vec![1, 0]);
    }
}
