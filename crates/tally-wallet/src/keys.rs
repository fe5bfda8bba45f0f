//! Seed management and BIP-32 account key derivation.
//!
//! Every account is derived independently per scheme: BIP-44 (legacy,
//! `m/44'/coin'/account'`) and BIP-84 (native segwit, `m/84'/coin'/account'`).
//! Receive keys live under `/0/i` and change keys under `/1/i` relative to
//! the account node. Contexts are rebuilt from the seed on demand and never
//! persisted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::{Network, PrivateKey, PublicKey, ScriptBuf};
use tally_core::address::{hash160, p2pkh_script, p2sh_script, p2wpkh_script, ScriptType};
use tally_core::constants::{CHANGE_CHAIN, RECEIVE_CHAIN};
use tally_core::types::{Account, ChainId, DerivationType, UnspentOutput, XPub};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::WalletError;
use crate::mnemonic::mnemonic_to_seed;

/// A 64-byte BIP-39 seed.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

fn derivation_err(e: impl fmt::Display) -> WalletError {
    WalletError::KeyDerivation(e.to_string())
}

// ── Derived keys ──────────────────────────────────────────────────────────────

/// A secp256k1 key pair at a known absolute path.
#[derive(Clone)]
pub struct DerivedKey {
    secret: SecretKey,
    public: PublicKey,
    path: DerivationPath,
}

impl DerivedKey {
    pub(crate) fn new(secp: &Secp256k1<All>, secret: SecretKey, path: DerivationPath) -> Self {
        let public = PublicKey::new(secret.public_key(secp));
        Self { secret, public, path }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Compressed public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Absolute path from the master key.
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Wallet import format. Handle with care.
    pub fn to_wif(&self, network: Network) -> Zeroizing<String> {
        Zeroizing::new(PrivateKey::new(self.secret, network).to_wif())
    }

    /// HASH160 of the compressed public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public.to_bytes())
    }

    /// The locking script this key can spend for `script_type`. P2SH means
    /// P2SH-wrapped P2WPKH.
    pub fn locking_script(&self, script_type: ScriptType) -> Option<ScriptBuf> {
        let hash = self.pubkey_hash();
        match script_type {
            ScriptType::P2PKH => Some(p2pkh_script(&hash)),
            ScriptType::P2WPKH => Some(p2wpkh_script(&hash)),
            ScriptType::P2SH => Some(p2sh_script(&hash160(p2wpkh_script(&hash).as_bytes()))),
            ScriptType::P2WSH | ScriptType::P2TR => None,
        }
    }

    /// Encode the address for `script_type` on `network`.
    pub fn address(&self, script_type: ScriptType, network: Network) -> Result<String, WalletError> {
        let script = self.locking_script(script_type).ok_or_else(|| {
            WalletError::KeyDerivation(format!("no single-key address for {script_type}"))
        })?;
        let address = bitcoin::Address::from_script(&script, network).map_err(derivation_err)?;
        Ok(address.to_string())
    }

    /// Checksummed account-model address.
    pub fn ethereum_address(&self) -> String {
        crate::evm::checksum_address(&self.public.inner)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("path", &self.path.to_string())
            .field("public", &self.public.to_string())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse a path relative to an account node: `M/0/5`, `m/1/3` or `0/7`.
///
/// Hardened components cannot appear below an extended public key and are
/// rejected.
pub fn parse_relative_path(path: &str) -> Result<Vec<ChildNumber>, WalletError> {
    let trimmed = path.trim();
    let rest = trimmed
        .strip_prefix("M/")
        .or_else(|| trimmed.strip_prefix("m/"))
        .unwrap_or(trimmed);
    if rest.is_empty() {
        return Err(WalletError::KeyDerivation(format!("empty path: {path:?}")));
    }
    rest.split('/')
        .map(|component| {
            if component.ends_with('\'') || component.ends_with('h') {
                return Err(WalletError::KeyDerivation(format!(
                    "hardened component {component:?} in relative path {path:?}"
                )));
            }
            let index: u32 = component
                .parse()
                .map_err(|_| WalletError::KeyDerivation(format!("bad component {component:?} in {path:?}")))?;
            ChildNumber::from_normal_idx(index).map_err(derivation_err)
        })
        .collect()
}

// ── Account derivation ────────────────────────────────────────────────────────

/// One scheme's account node: `m/purpose'/coin'/account'`.
pub struct AccountDerivation {
    derivation: DerivationType,
    network: Network,
    path: DerivationPath,
    xpriv: Xpriv,
    xpub: Xpub,
    secp: Secp256k1<All>,
}

impl AccountDerivation {
    fn derive(
        secp: &Secp256k1<All>,
        master: &Xpriv,
        account: Account,
        derivation: DerivationType,
        network: Network,
    ) -> Result<Self, WalletError> {
        let path = DerivationPath::from(vec![
            ChildNumber::from_hardened_idx(derivation.purpose()).map_err(derivation_err)?,
            ChildNumber::from_hardened_idx(account.chain.coin_type()).map_err(derivation_err)?,
            ChildNumber::from_hardened_idx(account.index).map_err(derivation_err)?,
        ]);
        let xpriv = master.derive_priv(secp, &path).map_err(derivation_err)?;
        let xpub = Xpub::from_priv(secp, &xpriv);
        Ok(Self {
            derivation,
            network,
            path,
            xpriv,
            xpub,
            secp: secp.clone(),
        })
    }

    pub fn derivation_type(&self) -> DerivationType {
        self.derivation
    }

    /// Address network. Account-model chains encode keys with mainnet
    /// version bytes.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Absolute path of the account node.
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Serialized extended public key.
    pub fn xpub(&self) -> String {
        self.xpub.to_string()
    }

    /// Serialized extended private key. Handle with care.
    pub fn xpriv(&self) -> Zeroizing<String> {
        Zeroizing::new(self.xpriv.to_string())
    }

    /// The account's extended public key as a repository key.
    pub fn xpub_key(&self) -> XPub {
        XPub::new(self.xpub(), self.derivation)
    }

    pub fn account_private_key(&self) -> DerivedKey {
        DerivedKey::new(&self.secp, self.xpriv.private_key, self.path.clone())
    }

    pub fn receive_private_key(&self, index: u32) -> Result<DerivedKey, WalletError> {
        self.derive_relative(&[
            ChildNumber::from_normal_idx(RECEIVE_CHAIN).map_err(derivation_err)?,
            ChildNumber::from_normal_idx(index).map_err(derivation_err)?,
        ])
    }

    pub fn change_private_key(&self, index: u32) -> Result<DerivedKey, WalletError> {
        self.derive_relative(&[
            ChildNumber::from_normal_idx(CHANGE_CHAIN).map_err(derivation_err)?,
            ChildNumber::from_normal_idx(index).map_err(derivation_err)?,
        ])
    }

    /// Key at a path relative to the account node, as reported alongside an
    /// unspent output.
    pub fn child_key(&self, path: &str) -> Result<DerivedKey, WalletError> {
        let children = parse_relative_path(path)?;
        self.derive_relative(&children)
    }

    pub fn receive_address(&self, index: u32) -> Result<String, WalletError> {
        self.receive_private_key(index)?
            .address(self.derivation.script_type(), self.network)
    }

    pub fn change_address(&self, index: u32) -> Result<String, WalletError> {
        self.change_private_key(index)?
            .address(self.derivation.script_type(), self.network)
    }

    fn derive_relative(&self, children: &[ChildNumber]) -> Result<DerivedKey, WalletError> {
        let child = self.xpriv.derive_priv(&self.secp, &children).map_err(derivation_err)?;
        Ok(DerivedKey::new(
            &self.secp,
            child.private_key,
            self.path.extend(children),
        ))
    }
}

impl fmt::Debug for AccountDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountDerivation")
            .field("derivation", &self.derivation)
            .field("path", &self.path.to_string())
            .field("xpub", &self.xpub.to_string())
            .finish_non_exhaustive()
    }
}

// ── Account key context ───────────────────────────────────────────────────────

/// Every scheme's account node for one account.
#[derive(Debug)]
pub struct AccountKeyContext {
    account: Account,
    derivations: Vec<AccountDerivation>,
}

impl AccountKeyContext {
    /// Derive all supported schemes for `account` from `seed`.
    pub fn derive(seed: &Seed, account: Account) -> Result<Self, WalletError> {
        let network = account.chain.network().unwrap_or(Network::Bitcoin);
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(network, seed.as_bytes()).map_err(derivation_err)?;
        let derivations = account
            .chain
            .derivation_types()
            .iter()
            .map(|&derivation| AccountDerivation::derive(&secp, &master, account, derivation, network))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { account, derivations })
    }

    /// Convenience: parse the phrase, stretch it and derive.
    pub fn from_mnemonic(phrase: &str, passphrase: &str, account: Account) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(phrase, passphrase)?;
        Self::derive(&seed, account)
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn chain(&self) -> ChainId {
        self.account.chain
    }

    pub fn derivations(&self) -> &[AccountDerivation] {
        &self.derivations
    }

    pub fn derivation(&self, derivation: DerivationType) -> Result<&AccountDerivation, WalletError> {
        self.derivations
            .iter()
            .find(|d| d.derivation == derivation)
            .ok_or_else(|| WalletError::UnsupportedDerivation {
                chain: self.account.chain.to_string(),
                derivation: derivation.to_string(),
            })
    }

    /// The scheme new addresses are issued from.
    pub fn default_derivation(&self) -> Result<&AccountDerivation, WalletError> {
        self.derivation(self.account.chain.default_derivation())
    }

    /// Every scheme's xpub, for repository queries.
    pub fn xpubs(&self) -> BTreeSet<XPub> {
        self.derivations.iter().map(AccountDerivation::xpub_key).collect()
    }

    pub fn derivation_for_xpub(&self, xpub: &str) -> Option<&AccountDerivation> {
        self.derivations.iter().find(|d| d.xpub() == xpub)
    }

    /// Key that controls `utxo`, derived from the scheme it was found under.
    pub fn signing_key_for(&self, utxo: &UnspentOutput) -> Result<DerivedKey, WalletError> {
        let derivation = self
            .derivation_for_xpub(&utxo.xpub.m)
            .ok_or_else(|| WalletError::KeyNotFound(format!("xpub {} is not part of this account", utxo.xpub.m)))?;
        derivation.child_key(&utxo.xpub.path)
    }
}

/// Parse an absolute path such as `m/84'/0'/0'`.
pub fn parse_absolute_path(path: &str) -> Result<DerivationPath, WalletError> {
    DerivationPath::from_str(path.trim()).map_err(derivation_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACTUS: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon cactus";
    const ABOUT: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn context(phrase: &str, chain: ChainId, index: u32) -> AccountKeyContext {
        AccountKeyContext::from_mnemonic(phrase, "", Account::new(chain, index)).unwrap()
    }

    fn secret_of(wif: &str) -> [u8; 32] {
        PrivateKey::from_wif(wif).unwrap().inner.secret_bytes()
    }

    fn assert_key(key: &DerivedKey, wif: &str) {
        assert_eq!(key.secret_key().secret_bytes(), secret_of(wif), "key at {}", key.path());
    }

    #[test]
    fn seed_debug_is_redacted() {
        let seed = Seed::from_bytes([7u8; 64]);
        let dbg = format!("{seed:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains('7'));
    }

    #[test]
    fn segwit_account_zero_extended_keys() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 0);
        let segwit = ctx.derivation(DerivationType::Segwit).unwrap();
        assert_eq!(
            segwit.xpub(),
            "xpub6D4nuUzLPukRYKmb6ZYxo5khwLJXHarYQutgauqv8UkAVV8NHw23UZPDoXdJZDqv5hHiyh55jCER2KuYt2a7Egnoj7TF8u7scsJbJPeCneM"
        );
        assert_eq!(
            segwit.xpriv().as_str(),
            "xprv9z5SVyTSZYC8Kqh7zY1xRwoyPJU2t88h3gy5nXSJa9DBcgoDkPhnvm4jxFF7XqA1JWx1hGMrCigYodb4Yr6xwTadjq1h2LBsWFYSD5AHihd"
        );
        assert_eq!(segwit.path(), &parse_absolute_path("m/84'/0'/0'").unwrap());
    }

    #[test]
    fn legacy_account_zero_extended_keys() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 0);
        let legacy = ctx.derivation(DerivationType::Legacy).unwrap();
        assert_eq!(
            legacy.xpub(),
            "xpub6Cqt2PEFm9dYerMNww1t75WhkyZGmVAcVTyt1Pt6LusF1BECwDWP35R3FotsdaMfekBc8uw6kDC8PYuZujkbsfMKrSwP7RhhcseL4SHQ4Di"
        );
        assert_eq!(
            legacy.xpriv().as_str(),
            "xprv9yrXcshMvn5FSNGuquUsjwZyCwinN2Sm8F4HD1UUnaLG8Nu4PgC8VH6ZQXZvhCtDsT6Zotg12jpCNvSx8t9jKtTcRa2si88nSHzsLA9saVH"
        );
    }

    #[test]
    fn segwit_account_zero_private_keys() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 0);
        let segwit = ctx.derivation(DerivationType::Segwit).unwrap();
        assert_key(&segwit.account_private_key(), "KxwEhkmNCgDHtY9WQLUjZQtdDCvvWmpJHAaBruSS9hWPaEFyX31K");
        assert_key(&segwit.receive_private_key(0).unwrap(), "L2crEKLjp8wJRRV3ELcWTZf9EuVEVg6cAMdiVmtkbdW4ePHH3T5a");
        assert_key(&segwit.receive_private_key(1).unwrap(), "L3m7XLXzDjUa6RRguCUyYGnnpXnw18RPfmxsAzBQNA8onNxxUvgs");
        assert_key(&segwit.change_private_key(0).unwrap(), "L2VmFLZSuZXaMAg47jXZS6QUviUY9eUGwWG9N7CFLim9jG66BCha");
        assert_key(&segwit.change_private_key(1).unwrap(), "L5cb6CCyDTCkLh4ghUxvYuiMrg4qEWdhR3AwYqBBpfwrFPtnxVX1");
    }

    #[test]
    fn legacy_account_zero_private_keys() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 0);
        let legacy = ctx.derivation(DerivationType::Legacy).unwrap();
        assert_key(&legacy.account_private_key(), "L25tqq4DUQBZ1cAcLRBbd5VMpphmjANX6KoVkxuNy8K8akVj9HBy");
        assert_key(&legacy.receive_private_key(0).unwrap(), "L1CnsYXUFwAM9q4Yi5u8aGqmbkA3ACtapNz66enUtD7ujavPntEG");
        assert_key(&legacy.receive_private_key(1).unwrap(), "L4XCL4XEBmacQJvyLh29LbXWbGvLCKqCRX2sfBJN28hbFTwiVSwH");
        assert_key(&legacy.change_private_key(0).unwrap(), "KwRGDmz6QB8y2QkNBV45nvyJRe9VE7RNnh6n7re56cmcTgHP98Ue");
        assert_key(&legacy.change_private_key(1).unwrap(), "Kz4spLQY4vkXvTgzuV9Rhcj7x4TaWshyzZYaQtAGX9k4SDqkwB5C");
    }

    #[test]
    fn segwit_account_one() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 1);
        let segwit = ctx.derivation(DerivationType::Segwit).unwrap();
        assert_eq!(
            segwit.xpub(),
            "xpub6D4nuUzLPukRaXBXWK55p8s7FCZmmXrhHJU7UJFxc9SMyYVFe4TQCYge95zsshNFk2NNxSRKPg1DGAEv5Gbuy5c7XLg1RawjokbTHD5sV3K"
        );
        assert_eq!(
            segwit.xpriv().as_str(),
            "xprv9z5SVyTSZYC8N374QHY5SzvNhAjHN58qv5YWfurM3ouP6kA76X99ekNAHnWmeaZJs1XweVo6a338DowajTPwuN3x4onwPpqq6EGwGfFSKQq"
        );
        assert_key(&segwit.receive_private_key(0).unwrap(), "L575uPa5VCkmhNBAvqWZvzS4HFPLWAjcJJwvofVXUcpSymhFDEBq");
        assert_key(&segwit.receive_private_key(1).unwrap(), "KyT6Nx2vQaqfC9AK7Cy4sY6ep3LmsFVZf1gmcEXtTjkR7fQmUmtH");
        assert_key(&segwit.change_private_key(0).unwrap(), "L1UWfq5sPZK2uw9v4xg1roMZCot598b6PCrt9RmmJtsvQ5FRkVz2");
        assert_key(&segwit.change_private_key(1).unwrap(), "Kyva49BqskPMTgPdiedzGU1F4Ymx6jMLXox7C983uJUCTnSeY7Jt");
    }

    #[test]
    fn legacy_account_one() {
        let ctx = context(CACTUS, ChainId::Bitcoin, 1);
        let legacy = ctx.derivation(DerivationType::Legacy).unwrap();
        assert_eq!(
            legacy.xpub(),
            "xpub6Cqt2PEFm9dYiKy5xqW8PXnCtzTiZVmaWGcbDDmrnfJr4EfJeQVyh4qYAG1YrHxn4Goy6dzbGB1T4upyDivg6YMmGMHFqVgr31M2x5vmnsM"
        );
        assert_eq!(
            legacy.xpriv().as_str(),
            "xprv9yrXcshMvn5FVqtcroy82PqULxdEA33j93gzQqNFEKmsBSLA6sBj9GX4Jxi4zQAaKTy2FDCYrByJC8sCFFZTba2Jq7Dj3sHcQXvhzUtdXyr"
        );
        assert_key(&legacy.account_private_key(), "Kx7XXCWQSDGuvt47SdUKDKvKwC1wyKbvyDiZbRmYrt5svZVyLLRF");
        assert_key(&legacy.receive_private_key(0).unwrap(), "L35DuWPX96LmyyxinCUn1UisEMshWeGexmyDFGxmKfNjvAYQMU2t");
        assert_key(&legacy.receive_private_key(1).unwrap(), "KxE6jJ26BrLPSEswPJwwADUUWpi9TFZkpXbXch7XgAQra6jpas6p");
        assert_key(&legacy.change_private_key(0).unwrap(), "KwjVqrrNctL1rEddHVP9rJzrDZJZEqqgLkXknTVBzEQTem4nMCy8");
        assert_key(&legacy.change_private_key(1).unwrap(), "L1nc6z1kePFx3wajNw2hQsAbiR4asVYuvoP5397doTi3GBEpJUbw");
    }

    #[test]
    fn bip84_receive_addresses() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let segwit = ctx.default_derivation().unwrap();
        let expected = [
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
            "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g",
            "bc1qp59yckz4ae5c4efgw2s5wfyvrz0ala7rgvuz8z",
            "bc1qgl5vlg0zdl7yvprgxj9fevsc6q6x5dmcyk3cn3",
            "bc1qm97vqzgj934vnaq9s53ynkyf9dgr05rargr04n",
            "bc1qnpzzqjzet8gd5gl8l6gzhuc4s9xv0djt0rlu7a",
            "bc1qtet8q6cd5vqm0zjfcfm8mfsydju0a29ggqrmu9",
            "bc1qhxgzmkmwvrlwvlfn4qe57lx2qdfg8phycnsarn",
            "bc1qncdts3qm2guw3hjstun7dd6t3689qg4230jh2n",
            "bc1qgswpjzsqgrm2qkfkf9kzqpw6642ptrgzapvh9y",
        ];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(&segwit.receive_address(i as u32).unwrap(), want, "index {i}");
        }
        assert_eq!(
            segwit.change_address(0).unwrap(),
            "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el"
        );
    }

    #[test]
    fn bip44_receive_address() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let legacy = ctx.derivation(DerivationType::Legacy).unwrap();
        assert_eq!(legacy.receive_address(0).unwrap(), "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
    }

    #[test]
    fn ethereum_account_address() {
        let ctx = context(ABOUT, ChainId::Ethereum, 0);
        assert_eq!(ctx.derivations().len(), 1);
        let key = ctx.default_derivation().unwrap().receive_private_key(0).unwrap();
        assert_eq!(key.ethereum_address(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[test]
    fn ethereum_has_no_segwit_scheme() {
        let ctx = context(ABOUT, ChainId::Ethereum, 0);
        assert!(matches!(
            ctx.derivation(DerivationType::Segwit),
            Err(WalletError::UnsupportedDerivation { .. })
        ));
    }

    #[test]
    fn child_key_matches_receive_and_change_keys() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let segwit = ctx.default_derivation().unwrap();
        let via_path = segwit.child_key("M/0/3").unwrap();
        let direct = segwit.receive_private_key(3).unwrap();
        assert_eq!(via_path.secret_key(), direct.secret_key());
        assert_eq!(via_path.path(), direct.path());

        let change = segwit.child_key("m/1/2").unwrap();
        assert_eq!(change.secret_key(), segwit.change_private_key(2).unwrap().secret_key());
        let bare = segwit.child_key("0/4").unwrap();
        assert_eq!(bare.secret_key(), segwit.receive_private_key(4).unwrap().secret_key());
    }

    #[test]
    fn relative_path_rejects_hardened_and_garbage() {
        assert!(parse_relative_path("m/84'/0'/0'").is_err());
        assert!(parse_relative_path("M/0h/1").is_err());
        assert!(parse_relative_path("M/").is_err());
        assert!(parse_relative_path("M/x/1").is_err());
        assert_eq!(parse_relative_path("M/0/5").unwrap().len(), 2);
    }

    #[test]
    fn signing_key_lookup_by_xpub() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let legacy = ctx.derivation(DerivationType::Legacy).unwrap();
        let utxo = UnspentOutput {
            tx_hash: "00".repeat(32),
            output_index: 0,
            script: String::new(),
            value: 1,
            confirmations: 1,
            xpub: tally_core::types::XPubRef { m: legacy.xpub(), path: "M/0/0".into() },
        };
        let key = ctx.signing_key_for(&utxo).unwrap();
        assert_eq!(key.secret_key(), legacy.receive_private_key(0).unwrap().secret_key());

        let foreign = UnspentOutput {
            xpub: tally_core::types::XPubRef { m: "xpubSomeoneElse".into(), path: "M/0/0".into() },
            ..utxo
        };
        assert!(matches!(ctx.signing_key_for(&foreign), Err(WalletError::KeyNotFound(_))));
    }

    #[test]
    fn xpub_set_has_one_entry_per_scheme() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let xpubs = ctx.xpubs();
        assert_eq!(xpubs.len(), 2);
        assert!(xpubs.iter().any(|x| x.derivation == DerivationType::Legacy));
        assert!(xpubs.iter().any(|x| x.derivation == DerivationType::Segwit));
    }

    #[test]
    fn out_of_range_account_index_is_an_error() {
        let err = AccountKeyContext::from_mnemonic(ABOUT, "", Account::new(ChainId::Bitcoin, 1 << 31)).unwrap_err();
        assert!(matches!(err, WalletError::KeyDerivation(_)));
    }

    #[test]
    fn testnet_uses_testnet_encoding() {
        let ctx = context(ABOUT, ChainId::BitcoinTestnet, 0);
        let segwit = ctx.default_derivation().unwrap();
        assert!(segwit.xpub().starts_with("tpub"));
        assert!(segwit.receive_address(0).unwrap().starts_with("tb1q"));
    }

    #[test]
    fn derived_key_debug_is_redacted() {
        let ctx = context(ABOUT, ChainId::Bitcoin, 0);
        let key = ctx.default_derivation().unwrap().receive_private_key(0).unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains(&hex::encode(key.secret_key().secret_bytes())));
    }
}
