//! Result cache with per-operation TTL memoization.
//!
//! The store itself never expires anything. Staleness is decided by
//! [`ResultCache::memoize`], which recomputes and overwrites an entry once
//! `now - inserted_at > ttl`. Concurrent callers of the same key share one
//! in-flight computation; only successful results are stored.

use crate::domain::Address;
use crate::error::LendError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Sentinel for "no discriminator" in a cache key.
pub const NO_DISCRIMINATOR: &str = "|";

/// `(contract, method, optional discriminator)` rendered as
/// `<contract>-<method>-<discriminator or |>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: String,
    method: String,
    discriminator: Option<String>,
}

impl CacheKey {
    pub fn new(contract: &Address, method: &str) -> Self {
        Self::scoped(contract.as_str(), method)
    }

    /// Key for values not tied to a contract, e.g. a network-wide price table.
    pub fn scoped(scope: &str, method: &str) -> Self {
        Self {
            scope: scope.to_string(),
            method: method.to_string(),
            discriminator: None,
        }
    }

    pub fn with_discriminator(mut self, discriminator: impl fmt::Display) -> Self {
        self.discriminator = Some(discriminator.to_string());
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.scope,
            self.method,
            self.discriminator.as_deref().unwrap_or(NO_DISCRIMINATOR)
        )
    }
}

/// TTL of each class of memoized operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Fast-moving market aggregates and quote tables.
    pub fast: Duration,
    /// Per-block figures: active band, bands info, total debt.
    pub per_block: Duration,
    /// Rates and fee parameters.
    pub rates: Duration,
    /// Structural constants: `A`, base price.
    pub constants: Duration,
    /// Externally fetched USD price tables.
    pub usd_prices: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(10),
            per_block: Duration::from_secs(60),
            rates: Duration::from_secs(5 * 60),
            constants: Duration::from_secs(24 * 60 * 60),
            usd_prices: Duration::from_secs(5 * 60),
        }
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedValue, LendError>>>;

struct CacheEntry {
    value: CachedValue,
    inserted_at: Instant,
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    next_id: u64,
}

/// Process-wide result cache, shared by reference between engines.
#[derive(Default)]
pub struct ResultCache {
    state: Mutex<CacheState>,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ResultCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every critical section is a single map update, so poisoning is ignored.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        self.lock()
            .entries
            .get(&key.to_string())
            .and_then(|entry| entry.value.downcast_ref::<T>().cloned())
    }

    pub fn set<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        self.lock().entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value),
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and detach in-flight fetches so their results are
    /// not stored once they land.
    pub fn clear(&self) {
        let mut state = self.lock();
        debug!(
            "Clearing result cache ({} entries, {} in flight)",
            state.entries.len(),
            state.in_flight.len()
        );
        state.entries.clear();
        state.in_flight.clear();
    }

    /// Return the cached value for `key` if younger than `ttl`, otherwise run
    /// `fetch` (or join the fetch already running for `key`).
    pub async fn memoize<T, F, Fut>(&self, key: CacheKey, ttl: Duration, fetch: F) -> Result<T, LendError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LendError>> + Send + 'static,
    {
        let key = key.to_string();
        let (id, shared) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(entry) = state.entries.get(&key) {
                if entry.inserted_at.elapsed() <= ttl {
                    if let Some(value) = entry.value.downcast_ref::<T>() {
                        trace!("cache hit {}", key);
                        return Ok(value.clone());
                    }
                }
            }

            match state.in_flight.get(&key) {
                Some(pending) => {
                    trace!("joining in-flight fetch {}", key);
                    (pending.id, pending.fetch.clone())
                }
                None => {
                    trace!("cache miss {}", key);
                    let fut = fetch();
                    let shared = async move { fut.await.map(|v| Arc::new(v) as CachedValue) }
                        .boxed()
                        .shared();
                    let id = state.next_id;
                    state.next_id += 1;
                    state.in_flight.insert(
                        key.clone(),
                        InFlight {
                            id,
                            fetch: shared.clone(),
                        },
                    );
                    (id, shared)
                }
            }
        };

        let result = shared.await;

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let ours = state.in_flight.get(&key).map(|p| p.id) == Some(id);
            if ours {
                state.in_flight.remove(&key);
                if let Ok(value) = &result {
                    state.entries.insert(
                        key.clone(),
                        CacheEntry {
                            value: value.clone(),
                            inserted_at: Instant::now(),
                        },
                    );
                }
            }
        }

        let value = result?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| LendError::domain(format!("cache entry {} has another type", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr() -> Address {
        Address::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    #[test]
    fn test_cache_key_format() {
        let key = CacheKey::new(&addr(), "fee");
        assert_eq!(
            key.to_string(),
            "0x00000000000000000000000000000000000000aa-fee-|"
        );
        let key = CacheKey::new(&addr(), "max_borrowable").with_discriminator("1.5");
        assert_eq!(
            key.to_string(),
            "0x00000000000000000000000000000000000000aa-max_borrowable-1.5"
        );
    }

    #[test]
    fn test_get_set_has_clear() {
        let cache = ResultCache::new();
        let key = CacheKey::new(&addr(), "A");
        assert!(!cache.has(&key));
        assert_eq!(cache.get::<u64>(&key), None);

        cache.set(&key, 100u64);
        assert!(cache.has(&key));
        assert_eq!(cache.get::<u64>(&key), Some(100));
        assert_eq!(cache.get::<String>(&key), None);

        cache.set(&key, 200u64);
        assert_eq!(cache.get::<u64>(&key), Some(200));

        cache.clear();
        assert!(cache.is_empty());
    }

    async fn read_counter(
        cache: &ResultCache,
        calls: Arc<AtomicUsize>,
        ttl: Duration,
    ) -> Result<u64, LendError> {
        let key = CacheKey::new(&addr(), "total_debt");
        cache
            .memoize(key, ttl, move || async move {
                Ok(calls.fetch_add(1, Ordering::SeqCst) as u64)
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_memoize_respects_ttl() {
        let cache = ResultCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(10);

        assert_eq!(read_counter(&cache, calls.clone(), ttl).await.unwrap(), 0);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(read_counter(&cache, calls.clone(), ttl).await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(read_counter(&cache, calls.clone(), ttl).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_does_not_cache_failures() {
        let cache = ResultCache::new();
        let key = CacheKey::new(&addr(), "rate");
        let ttl = Duration::from_secs(60);

        let err = cache
            .memoize::<u64, _, _>(key.clone(), ttl, || async {
                Err(LendError::batch_read("node down"))
            })
            .await;
        assert!(err.is_err());
        assert!(!cache.has(&key));

        let ok = cache.memoize(key.clone(), ttl, || async { Ok(7u64) }).await;
        assert_eq!(ok.unwrap(), 7);
        assert!(cache.has(&key));
    }

    #[tokio::test]
    async fn test_memoize_single_flight() {
        let cache = Arc::new(ResultCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = rx.shared();

        let make = |calls: Arc<AtomicUsize>, rx: Shared<tokio::sync::oneshot::Receiver<()>>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = rx.await;
                Ok(42u64)
            }
        };

        let key = CacheKey::new(&addr(), "stats");
        let ttl = Duration::from_secs(10);
        let first = {
            let cache = cache.clone();
            let f = make(calls.clone(), rx.clone());
            let key = key.clone();
            tokio::spawn(async move { cache.memoize(key, ttl, f).await })
        };
        let second = {
            let cache = cache.clone();
            let f = make(calls.clone(), rx.clone());
            let key = key.clone();
            tokio::spawn(async move { cache.memoize(key, ttl, f).await })
        };

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = tx.send(());

        assert_eq!(first.await.unwrap().unwrap(), 42);
        assert_eq!(second.await.unwrap().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_detaches_in_flight() {
        let cache = Arc::new(ResultCache::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let key = CacheKey::new(&addr(), "bands_info");
        let ttl = Duration::from_secs(60);

        let pending = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .memoize(key, ttl, move || async move {
                        let _ = rx.await;
                        Ok(1u64)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.clear();
        let _ = tx.send(());

        assert_eq!(pending.await.unwrap().unwrap(), 1);
        assert!(!cache.has(&key));
    }
}
