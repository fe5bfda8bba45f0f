//! Submit signed transactions to the backend.

use std::sync::Arc;

use tally_core::error::NetworkError;
use tally_core::traits::BroadcastClient;
use tracing::{info, warn};

use crate::signer::SignedTransaction;

fn normalize(hash: &str) -> String {
    let hash = hash.trim();
    hash.strip_prefix("0x").unwrap_or(hash).to_ascii_lowercase()
}

pub struct Broadcaster {
    client: Arc<dyn BroadcastClient>,
}

impl Broadcaster {
    pub fn new(client: Arc<dyn BroadcastClient>) -> Self {
        Self { client }
    }

    /// Push `signed` and return its txid once the backend has accepted it.
    ///
    /// The hash the backend reports must match the locally computed txid
    /// (ignoring case and a `0x` prefix); a different hash is
    /// [`NetworkError::Malformed`].
    ///
    /// Nothing here retries. A transport error or timeout does not mean the
    /// transaction was rejected, and sending it again may submit it twice.
    pub async fn send(
        &self,
        signed: &SignedTransaction,
        lock_secret: Option<&str>,
    ) -> Result<String, NetworkError> {
        let reported = self.client.push_transaction(&signed.encoded, lock_secret).await?;
        if normalize(&reported) != normalize(&signed.txid) {
            warn!(local = %signed.txid, reported = %reported, "broadcast: hash mismatch");
            return Err(NetworkError::Malformed(format!(
                "backend reported {reported}, expected {}",
                signed.txid
            )));
        }
        info!(txid = %signed.txid, size = signed.size, fee = %signed.fee, "broadcast: accepted");
        Ok(signed.txid.clone())
    }
}
