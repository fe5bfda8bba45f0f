//! Cached repositories over the chain data clients.
//!
//! Responses are cached per key set, so two wallets (or two derivation
//! subsets of one wallet) never share an entry. There is no retry here:
//! failures reach the caller as-is.

use std::collections::BTreeSet;
use std::sync::Arc;

use tally_core::error::NetworkError;
use tally_core::traits::{FeeClient, MultiAddressClient, UnspentOutputsClient};
use tally_core::types::{ChainId, FeeRates, MultiAddress, UnspentOutput, XPub};
use tracing::debug;

use crate::cache::SingleFlightCache;
use crate::config::CacheConfig;

/// Unspent outputs and address activity for sets of extended keys.
pub struct UtxoRepository {
    unspent_client: Arc<dyn UnspentOutputsClient>,
    multi_address_client: Arc<dyn MultiAddressClient>,
    unspent: SingleFlightCache<BTreeSet<XPub>, Vec<UnspentOutput>>,
    multi_address: SingleFlightCache<BTreeSet<XPub>, MultiAddress>,
}

impl UtxoRepository {
    pub fn new(
        unspent_client: Arc<dyn UnspentOutputsClient>,
        multi_address_client: Arc<dyn MultiAddressClient>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            unspent_client,
            multi_address_client,
            unspent: SingleFlightCache::new("unspent", config.utxo_ttl),
            multi_address: SingleFlightCache::new("multiaddr", config.utxo_ttl),
        }
    }

    pub async fn unspent_outputs(
        &self,
        xpubs: &BTreeSet<XPub>,
        force: bool,
    ) -> Result<Vec<UnspentOutput>, NetworkError> {
        let client = Arc::clone(&self.unspent_client);
        let keys: Vec<XPub> = xpubs.iter().cloned().collect();
        self.unspent
            .get_or_fetch(xpubs.clone(), force, || async move {
                client.unspent_outputs(&keys).await
            })
            .await
    }

    pub async fn multi_address(
        &self,
        xpubs: &BTreeSet<XPub>,
        force: bool,
    ) -> Result<MultiAddress, NetworkError> {
        let client = Arc::clone(&self.multi_address_client);
        let keys: Vec<XPub> = xpubs.iter().cloned().collect();
        self.multi_address
            .get_or_fetch(xpubs.clone(), force, || async move {
                client.multi_address(&keys).await
            })
            .await
    }

    /// Fetch both views concurrently. Fails if either fails.
    pub async fn fetch(
        &self,
        xpubs: &BTreeSet<XPub>,
        force: bool,
    ) -> Result<(Vec<UnspentOutput>, MultiAddress), NetworkError> {
        let (unspent, multi_address) =
            tokio::try_join!(self.unspent_outputs(xpubs, force), self.multi_address(xpubs, force))?;
        debug!(
            xpubs = xpubs.len(),
            outputs = unspent.len(),
            height = multi_address.latest_block_height,
            "repository: fetched"
        );
        Ok((unspent, multi_address))
    }

    /// Forget one key set, e.g. after spending from it.
    pub fn invalidate(&self, xpubs: &BTreeSet<XPub>) {
        self.unspent.invalidate(xpubs);
        self.multi_address.invalidate(xpubs);
    }

    /// Forget everything. Called on logout.
    pub fn invalidate_all(&self) {
        self.unspent.invalidate_all();
        self.multi_address.invalidate_all();
    }
}

/// Fee quotes per chain.
pub struct FeeRepository {
    client: Arc<dyn FeeClient>,
    cache: SingleFlightCache<ChainId, FeeRates>,
}

impl FeeRepository {
    pub fn new(client: Arc<dyn FeeClient>, config: &CacheConfig) -> Self {
        Self {
            client,
            cache: SingleFlightCache::new("fees", config.fee_ttl),
        }
    }

    pub async fn fees(&self, chain: ChainId) -> Result<FeeRates, NetworkError> {
        let client = Arc::clone(&self.client);
        self.cache
            .get_or_fetch(chain, false, || async move { client.fees(chain).await })
            .await
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tally_core::types::{DerivationType, FeeLimits, XPubRef};

    #[derive(Default)]
    struct MockBackend {
        unspent_calls: AtomicUsize,
        multi_calls: AtomicUsize,
        fee_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl UnspentOutputsClient for MockBackend {
        async fn unspent_outputs(&self, xpubs: &[XPub]) -> Result<Vec<UnspentOutput>, NetworkError> {
            self.unspent_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(NetworkError::Status { status: 503, body: "down".into() });
            }
            Ok(xpubs
                .iter()
                .enumerate()
                .map(|(i, x)| UnspentOutput {
                    tx_hash: format!("{i:064x}"),
                    output_index: 0,
                    script: "0014751e76e8199196d454941c45d1b3a323f1433bd6".into(),
                    value: 1_000,
                    confirmations: 1,
                    xpub: XPubRef { m: x.address.clone(), path: "M/0/0".into() },
                })
                .collect())
        }
    }

    #[async_trait]
    impl MultiAddressClient for MockBackend {
        async fn multi_address(&self, _xpubs: &[XPub]) -> Result<MultiAddress, NetworkError> {
            self.multi_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(MultiAddress { addresses: Vec::new(), latest_block_height: 100 })
        }
    }

    #[async_trait]
    impl FeeClient for MockBackend {
        async fn fees(&self, _chain: ChainId) -> Result<FeeRates, NetworkError> {
            self.fee_calls.fetch_add(1, Ordering::SeqCst);
            Ok(FeeRates { regular: 3, priority: 9, limits: FeeLimits { min: 1, max: 100 } })
        }
    }

    fn keys(names: &[&str]) -> BTreeSet<XPub> {
        names.iter().map(|n| XPub::new(*n, DerivationType::Segwit)).collect()
    }

    fn repo(backend: &Arc<MockBackend>) -> UtxoRepository {
        UtxoRepository::new(backend.clone(), backend.clone(), &CacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_returns_both_views_and_caches() {
        let backend = Arc::new(MockBackend::default());
        let repo = repo(&backend);
        let set = keys(&["a", "b"]);

        let (utxos, ma) = repo.fetch(&set, false).await.unwrap();
        assert_eq!(utxos.len(), 2);
        assert_eq!(ma.latest_block_height, 100);

        repo.fetch(&set, false).await.unwrap();
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.multi_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_for_same_set_coalesce() {
        let backend = Arc::new(MockBackend::default());
        let repo = repo(&backend);
        let set = keys(&["a"]);
        let (r1, r2) = tokio::join!(repo.unspent_outputs(&set, false), repo.unspent_outputs(&set, false));
        assert_eq!(r1.unwrap(), r2.unwrap());
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_sets_are_cached_separately() {
        let backend = Arc::new(MockBackend::default());
        let repo = repo(&backend);
        repo.unspent_outputs(&keys(&["a"]), false).await.unwrap();
        repo.unspent_outputs(&keys(&["a", "b"]), false).await.unwrap();
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_and_force_refetch() {
        let backend = Arc::new(MockBackend::default());
        let repo = repo(&backend);
        let set = keys(&["a"]);
        repo.unspent_outputs(&set, false).await.unwrap();
        repo.unspent_outputs(&set, true).await.unwrap();
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        repo.unspent_outputs(&set, false).await.unwrap();
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_propagates_and_is_not_cached() {
        let backend = Arc::new(MockBackend { fail: true, ..MockBackend::default() });
        let repo = repo(&backend);
        let set = keys(&["a"]);
        let err = repo.fetch(&set, false).await.unwrap_err();
        assert!(matches!(err, NetworkError::Status { status: 503, .. }));
        assert!(repo.unspent_outputs(&set, false).await.is_err());
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_all_forces_next_fetch() {
        let backend = Arc::new(MockBackend::default());
        let repo = repo(&backend);
        let set = keys(&["a"]);
        repo.fetch(&set, false).await.unwrap();
        repo.invalidate_all();
        repo.fetch(&set, false).await.unwrap();
        assert_eq!(backend.unspent_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.multi_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fee_quotes_are_cached() {
        let backend = Arc::new(MockBackend::default());
        let fees = FeeRepository::new(backend.clone(), &CacheConfig::default());
        assert_eq!(fees.fees(ChainId::Bitcoin).await.unwrap().regular, 3);
        fees.fees(ChainId::Bitcoin).await.unwrap();
        assert_eq!(backend.fee_calls.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_secs(91)).await;
        fees.fees(ChainId::Bitcoin).await.unwrap();
        assert_eq!(backend.fee_calls.load(Ordering::SeqCst), 2);
    }
}
