//! Time-bounded, single-flight response cache.
//!
//! Each key is either absent, `Ready` with a value and its fetch time, or
//! `Pending` on a shared [`OnceCell`] that every concurrent caller awaits.
//! Only the caller that installed a pending slot may replace it, and only if
//! the slot was not invalidated or superseded in the meantime. The map lock
//! is a `parking_lot::Mutex` and is never held across an `.await`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tally_core::error::NetworkError;
use tokio::sync::OnceCell;
use tokio::time::{Duration, Instant};
use tracing::debug;

type Flight<V> = Arc<OnceCell<Result<V, NetworkError>>>;

enum Slot<V> {
    Ready { value: V, fetched_at: Instant },
    Pending(Flight<V>),
}

/// A cache that coalesces concurrent fetches of the same key.
///
/// Failures are delivered to every waiter of the failed flight and are never
/// stored.
pub struct SingleFlightCache<K, V> {
    name: &'static str,
    ttl: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty cache. `name` only labels log lines.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or run `fetch` to produce it.
    ///
    /// With `force`, a ready value is ignored and refetched; a fetch already
    /// in flight is joined rather than duplicated.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, force: bool, fetch: F) -> Result<V, NetworkError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, NetworkError>>,
    {
        let flight = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(Slot::Ready { value, fetched_at }) if !force && fetched_at.elapsed() < self.ttl => {
                    debug!(cache = self.name, ?key, "cache: hit");
                    return Ok(value.clone());
                }
                Some(Slot::Pending(flight)) => {
                    debug!(cache = self.name, ?key, "cache: joining in-flight fetch");
                    Arc::clone(flight)
                }
                _ => {
                    debug!(cache = self.name, ?key, force, "cache: miss");
                    let flight: Flight<V> = Arc::new(OnceCell::new());
                    slots.insert(key.clone(), Slot::Pending(Arc::clone(&flight)));
                    flight
                }
            }
        };

        let result = flight.get_or_init(fetch).await.clone();
        self.settle(&key, &flight, &result);
        result
    }

    /// Replace our pending slot with the outcome, unless the slot changed.
    fn settle(&self, key: &K, flight: &Flight<V>, result: &Result<V, NetworkError>) {
        let mut slots = self.slots.lock();
        let still_ours = matches!(
            slots.get(key),
            Some(Slot::Pending(current)) if Arc::ptr_eq(current, flight)
        );
        if !still_ours {
            return;
        }
        match result {
            Ok(value) => {
                slots.insert(
                    key.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            Err(e) => {
                debug!(cache = self.name, ?key, error = %e, "cache: fetch failed, not stored");
                slots.remove(key);
            }
        }
    }

    /// Drop one entry. A fetch in flight for it will not be stored.
    pub fn invalidate(&self, key: &K) {
        self.slots.lock().remove(key);
    }

    /// Drop every entry. Fetches in flight will not be stored.
    pub fn invalidate_all(&self) {
        let mut slots = self.slots.lock();
        debug!(cache = self.name, entries = slots.len(), "cache: invalidate all");
        slots.clear();
    }

    /// Number of ready or pending entries.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> SingleFlightCache<&'static str, u64> {
        SingleFlightCache::new("test", Duration::from_secs(60))
    }

    async fn counted(calls: &AtomicUsize, value: u64) -> Result<u64, NetworkError> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(value)
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_served_from_cache() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        assert_eq!(cache.get_or_fetch("k", false, || counted(&calls, 7)).await.unwrap(), 7);
        assert_eq!(cache.get_or_fetch("k", false, || counted(&calls, 8)).await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_share_one_fetch() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("k", false, || counted(&calls, 1)),
            cache.get_or_fetch("k", false, || counted(&calls, 2)),
            cache.get_or_fetch("k", false, || counted(&calls, 3)),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (1, 1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_fetch_independently() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let (a, b) = tokio::join!(
            cache.get_or_fetch("a", false, || counted(&calls, 1)),
            cache.get_or_fetch("b", false, || counted(&calls, 2)),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        cache.get_or_fetch("k", false, || counted(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let v = cache.get_or_fetch("k", false, || counted(&calls, 2)).await.unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn force_bypasses_ready_value() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        cache.get_or_fetch("k", false, || counted(&calls, 1)).await.unwrap();
        let v = cache.get_or_fetch("k", true, || counted(&calls, 2)).await.unwrap();
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn force_joins_in_flight_fetch() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", false, || counted(&calls, 1)),
            cache.get_or_fetch("k", true, || counted(&calls, 2)),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_shared_but_not_cached() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let failing = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u64, _>(NetworkError::Timeout)
        };
        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", false, failing),
            cache.get_or_fetch("k", false, failing),
        );
        assert_eq!(a.unwrap_err(), NetworkError::Timeout);
        assert_eq!(b.unwrap_err(), NetworkError::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        let v = cache.get_or_fetch("k", false, || counted(&calls, 5)).await.unwrap();
        assert_eq!(v, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_during_fetch_discards_result() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let fetch = cache.get_or_fetch("k", false, || counted(&calls, 1));
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.invalidate_all();
        };
        let (v, ()) = tokio::join!(fetch, invalidate);
        // The caller still gets its answer...
        assert_eq!(v.unwrap(), 1);
        // ...but it was not stored.
        assert!(cache.is_empty());
        let v = cache.get_or_fetch("k", false, || counted(&calls, 2)).await.unwrap();
        assert_eq!(v, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_single_key() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        cache.get_or_fetch("a", false, || counted(&calls, 1)).await.unwrap();
        cache.get_or_fetch("b", false, || counted(&calls, 2)).await.unwrap();
        cache.invalidate(&"a");
        assert_eq!(cache.len(), 1);
    }
}
