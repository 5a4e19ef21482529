use crate::key::MarketKey;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use xchg_core::{ExchangeError, Result};

type SharedFetch<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

/// Keyed store of immutable snapshots with get-or-fetch population.
///
/// * Reads never block on fetches and never trigger one (`get`).
/// * Writes replace the whole snapshot for a key (`put`); readers see either the
///   old or the new `Arc`, never a mix.
/// * At most one fetch per key is in flight. Concurrent `get_or_refresh` and
///   `refresh` callers for that key join it and receive the same result.
/// * Fetches run on their own task. A caller that gives up (deadline or drop)
///   does not cancel the fetch for other waiters.
/// * A failed fetch leaves the stored entry untouched.
///
/// Cloning is cheap and yields a handle to the same store.
pub struct SnapshotStore<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    kind: &'static str,
    entries: DashMap<MarketKey, Arc<V>>,
    inflight: Mutex<HashMap<MarketKey, SharedFetch<V>>>,
}

enum Flight<V> {
    Ready(Arc<V>),
    Waiting(SharedFetch<V>),
}

/// Retires the in-flight marker when the fetch task ends, panics included.
struct InflightGuard<V> {
    inner: Arc<Inner<V>>,
    key: MarketKey,
}

impl<V> Drop for InflightGuard<V> {
    fn drop(&mut self) {
        self.inner.inflight.lock().remove(&self.key);
    }
}

impl<V> Clone for SnapshotStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> std::fmt::Debug for SnapshotStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("kind", &self.inner.kind)
            .field("entries", &self.inner.entries.len())
            .field("inflight", &self.inner.inflight.lock().len())
            .finish()
    }
}

impl<V: Send + Sync + 'static> SnapshotStore<V> {
    /// `kind` names the snapshot type in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                entries: DashMap::new(),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    pub fn get(&self, key: &MarketKey) -> Result<Arc<V>> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExchangeError::NotFound(format!("{} for {}", self.inner.kind, key)))
    }

    /// Unconditional overwrite; last write wins.
    pub fn put(&self, key: MarketKey, snapshot: impl Into<Arc<V>>) -> Arc<V> {
        let snapshot = snapshot.into();
        self.inner.entries.insert(key, snapshot.clone());
        snapshot
    }

    /// Return the stored snapshot, or run `fetch` once for all concurrent
    /// callers of this key and store its result.
    pub async fn get_or_refresh<F, Fut>(&self, key: MarketKey, fetch: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Ok(snapshot) = self.get(&key) {
            return Ok(snapshot);
        }
        match self.flight(key, fetch, false) {
            Flight::Ready(snapshot) => Ok(snapshot),
            Flight::Waiting(fetch) => fetch.await,
        }
    }

    pub async fn get_or_refresh_within<F, Fut>(
        &self,
        key: MarketKey,
        deadline: Duration,
        fetch: F,
    ) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        tokio::time::timeout(deadline, self.get_or_refresh(key, fetch))
            .await
            .map_err(|_| ExchangeError::Timeout(deadline))?
    }

    /// Always fetch, joining a fetch already in flight for the key.
    pub async fn refresh<F, Fut>(&self, key: MarketKey, fetch: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self.flight(key, fetch, true) {
            Flight::Ready(snapshot) => Ok(snapshot),
            Flight::Waiting(fetch) => fetch.await,
        }
    }

    pub async fn refresh_within<F, Fut>(
        &self,
        key: MarketKey,
        deadline: Duration,
        fetch: F,
    ) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        tokio::time::timeout(deadline, self.refresh(key, fetch))
            .await
            .map_err(|_| ExchangeError::Timeout(deadline))?
    }

    pub fn remove(&self, key: &MarketKey) -> Option<Arc<V>> {
        self.inner.entries.remove(key).map(|(_, snapshot)| snapshot)
    }

    /// Drop every entry belonging to `exchange`.
    pub fn remove_exchange(&self, exchange: &str) -> usize {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|key, _| !key.is_exchange(exchange));
        before.saturating_sub(self.inner.entries.len())
    }

    pub fn keys(&self) -> Vec<MarketKey> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Join the fetch in flight for `key`, or start one. Without `force` a
    /// snapshot stored since the caller's miss is returned instead.
    fn flight<F, Fut>(&self, key: MarketKey, fetch: F, force: bool) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut inflight = self.inner.inflight.lock();
        if let Some(existing) = inflight.get(&key) {
            return Flight::Waiting(existing.clone());
        }
        if !force {
            if let Some(entry) = self.inner.entries.get(&key) {
                return Flight::Ready(entry.value().clone());
            }
        }

        debug!(kind = self.inner.kind, key = %key, "Starting fetch");
        let future = fetch();
        let guard = InflightGuard {
            inner: self.inner.clone(),
            key: key.clone(),
        };
        let task = tokio::spawn(async move {
            let result = future.await.map(Arc::new);
            if let Ok(snapshot) = &result {
                guard.inner.entries.insert(guard.key.clone(), snapshot.clone());
            }
            drop(guard);
            result
        });

        let kind = self.inner.kind;
        let shared = async move {
            task.await.map_err(|e| {
                ExchangeError::Internal(format!("{} fetch task failed: {}", kind, e))
            })?
        }
        .boxed()
        .shared();

        inflight.insert(key, shared.clone());
        Flight::Waiting(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xchg_core::{CurrencyPair, UpstreamError};

    #[derive(Debug, Clone, PartialEq)]
    struct Quote {
        bid: u32,
        ask: u32,
    }

    fn key(exchange: &str, base: &str) -> MarketKey {
        MarketKey::spot(exchange, CurrencyPair::new(base, "USD"))
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let err = store.get(&key("a", "BTC")).unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound(_)));
    }

    #[test]
    fn test_put_then_get_returns_same_snapshot() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let written = store.put(key("a", "BTC"), Quote { bid: 1, ask: 2 });
        let read = store.get(&key("A", "BTC")).unwrap();
        assert!(Arc::ptr_eq(&written, &read));

        store.put(key("a", "BTC"), Quote { bid: 3, ask: 4 });
        assert_eq!(*store.get(&key("a", "BTC")).unwrap(), Quote { bid: 3, ask: 4 });
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_refresh_fetches_once() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let first = store
            .get_or_refresh(key("ExchangeA", "BTC"), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Quote { bid: 100, ask: 101 })
            })
            .await
            .unwrap();
        assert_eq!(*first, Quote { bid: 100, ask: 101 });

        let second = store.get(&key("ExchangeA", "BTC")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let counter = calls.clone();
        let third = store
            .get_or_refresh(key("ExchangeA", "BTC"), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Quote { bid: 0, ask: 0 })
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_fetch() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    store
                        .get_or_refresh(key("a", "ETH"), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(Quote { bid: 7, ask: 8 })
                        })
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_refresh_and_get_or_refresh_share_one_fetch() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = |calls: Arc<AtomicUsize>, bid: u32| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(Quote { bid, ask: bid + 1 })
            }
        };

        let refresher = {
            let store = store.clone();
            let fetch = fetch(calls.clone(), 10);
            tokio::spawn(async move { store.refresh(key("a", "SOL"), fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let reader = {
            let store = store.clone();
            let fetch = fetch(calls.clone(), 20);
            tokio::spawn(async move { store.get_or_refresh(key("a", "SOL"), fetch).await })
        };

        let refreshed = refresher.await.unwrap().unwrap();
        let read = reader.await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&refreshed, &read));
        assert_eq!(read.bid, 10);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_poison() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");

        let err = store
            .get_or_refresh(key("a", "BTC"), || async {
                Err(UpstreamError::Transport("connection reset".to_string()).into())
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_empty());

        let ok = store
            .get_or_refresh(key("a", "BTC"), || async { Ok(Quote { bid: 1, ask: 2 }) })
            .await
            .unwrap();
        assert_eq!(ok.bid, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let previous = store.put(key("a", "BTC"), Quote { bid: 1, ask: 2 });

        assert!(store
            .refresh(key("a", "BTC"), || async { Err(ExchangeError::malformed("bad json")) })
            .await
            .is_err());
        assert!(Arc::ptr_eq(&previous, &store.get(&key("a", "BTC")).unwrap()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_keys_fetch_in_parallel() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let fetch = |b: Arc<tokio::sync::Barrier>, bid: u32| {
            move || async move {
                // Both fetches must be running at once to pass the barrier.
                b.wait().await;
                Ok(Quote { bid, ask: bid + 1 })
            }
        };

        let both = async {
            tokio::join!(
                store.get_or_refresh(key("a", "BTC"), fetch(barrier.clone(), 1)),
                store.get_or_refresh(key("a", "ETH"), fetch(barrier.clone(), 2)),
            )
        };
        let (btc, eth) = tokio::time::timeout(Duration::from_secs(2), both)
            .await
            .unwrap();
        assert_eq!(btc.unwrap().bid, 1);
        assert_eq!(eth.unwrap().bid, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_does_not_cancel_shared_fetch() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        let slow = || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Quote { bid: 5, ask: 6 })
        };

        let err = store
            .get_or_refresh_within(key("a", "BTC"), Duration::from_millis(20), slow)
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Timeout(Duration::from_millis(20)));

        let joined = store
            .get_or_refresh(key("a", "BTC"), || async {
                Ok(Quote { bid: 0, ask: 0 })
            })
            .await
            .unwrap();
        assert_eq!(joined.bid, 5);
    }

    #[tokio::test]
    async fn test_remove_exchange_and_clear() {
        let store: SnapshotStore<Quote> = SnapshotStore::new("quote");
        store.put(key("a", "BTC"), Quote { bid: 1, ask: 2 });
        store.put(key("a", "ETH"), Quote { bid: 1, ask: 2 });
        store.put(key("b", "BTC"), Quote { bid: 1, ask: 2 });

        assert_eq!(store.remove_exchange("A"), 2);
        assert_eq!(store.keys(), vec![key("b", "BTC")]);
        assert!(store.remove(&key("b", "BTC")).is_some());

        store.put(key("c", "BTC"), Quote { bid: 1, ask: 2 });
        store.clear();
        assert!(store.is_empty());
    }
}
