//! Namespaced TTL cache with negative caching
//!
//! "Not cached" and "cached as not-found" are different states here. Upstream
//! lookups for nonexistent resources (deleted users, pruned threads) are a
//! cheap-to-repeat failure mode, so a fetch that legitimately returned
//! nothing is cached too, with its own shorter TTL, instead of being
//! retried on every call. Callers only ever see `Option<V>`; the internal
//! distinction never leaks past [`Lookup`].
//!
//! All operations are serialized behind a single mutex. `get_or_fetch` drops
//! the lock before awaiting the fetch, so a slow upstream call never blocks
//! other cache users.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

/// Default TTL for positive entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default TTL for cached negative results
pub const DEFAULT_NONE_TTL: Duration = Duration::from_secs(60);

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Unexpired entry with a value
    Hit(V),
    /// Unexpired entry recording that the fetch returned nothing
    NegativeHit,
    /// No entry, or the entry had expired
    Miss,
}

impl<V> Lookup<V> {
    /// Collapse to the caller-level value: `Hit(v)` becomes `Some(v)`,
    /// everything else `None`.
    pub fn value(self) -> Option<V> {
        match self {
            Lookup::Hit(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    /// `None` records a logical not-found, distinct from an absent entry
    value: Option<V>,
    expire_at: Instant,
}

struct Inner<V> {
    map: HashMap<(String, String), Entry<V>>,
    hits: u64,
    misses: u64,
}

/// Thread-safe namespaced key-value cache with per-entry TTL.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    default_ttl: Duration,
    /// 0 = unbounded
    max_size: usize,
}

impl<V: Clone> TtlCache<V> {
    /// Create an unbounded cache with the default positive TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL, 0)
    }

    /// Create a cache with an explicit default TTL and size bound
    /// (`max_size == 0` means unbounded).
    pub fn with_ttl(default_ttl: Duration, max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            default_ttl,
            max_size,
        }
    }

    // Every mutation is completed under the lock, so the map is consistent
    // even when a previous holder panicked; recover the guard rather than
    // propagating the poison.
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up an entry.
    pub fn get(&self, namespace: &str, key: &str) -> Lookup<V> {
        let mut inner = self.lock();
        let cache_key = (namespace.to_string(), key.to_string());
        let now = Instant::now();

        let live = inner
            .map
            .get(&cache_key)
            .map(|entry| (entry.value.clone(), now <= entry.expire_at));

        match live {
            Some((value, true)) => {
                inner.hits += 1;
                match value {
                    Some(v) => Lookup::Hit(v),
                    None => Lookup::NegativeHit,
                }
            }
            Some((_, false)) => {
                // Expired: treat as absent and drop the stale entry.
                inner.map.remove(&cache_key);
                inner.misses += 1;
                Lookup::Miss
            }
            None => {
                inner.misses += 1;
                Lookup::Miss
            }
        }
    }

    /// Insert an entry. `value: None` caches a logical not-found.
    pub fn set(&self, namespace: &str, key: &str, value: Option<V>, ttl: Option<Duration>) {
        let expire_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let cache_key = (namespace.to_string(), key.to_string());
        let mut inner = self.lock();

        if self.max_size > 0
            && !inner.map.contains_key(&cache_key)
            && inner.map.len() >= self.max_size
        {
            // Evict the entry closest to expiry, not the least recently used:
            // expiry proximity is what this cache orders its contents by.
            if let Some(victim) = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.expire_at)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&victim);
            }
        }

        inner.map.insert(cache_key, Entry { value, expire_at });
    }

    /// Return the cached value, or run `fetch` and cache its result.
    ///
    /// A fetch that returns `Ok(None)` is cached for `none_ttl` so the
    /// upstream is not hammered for resources that don't exist; the caller
    /// still receives `None`. A fetch error is propagated and nothing is
    /// cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        fetch: F,
        ttl: Option<Duration>,
        none_ttl: Duration,
    ) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>>>,
    {
        match self.get(namespace, key) {
            Lookup::Hit(v) => return Ok(Some(v)),
            Lookup::NegativeHit => return Ok(None),
            Lookup::Miss => {}
        }

        let value = fetch().await?;
        match &value {
            Some(_) => self.set(namespace, key, value.clone(), ttl),
            None => {
                if !none_ttl.is_zero() {
                    self.set(namespace, key, None, Some(none_ttl));
                }
            }
        }
        Ok(value)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, namespace: &str, key: &str) -> bool {
        let cache_key = (namespace.to_string(), key.to_string());
        self.lock().map.remove(&cache_key).is_some()
    }

    /// Remove every entry in a namespace. Returns the count removed.
    pub fn invalidate(&self, namespace: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.map.len();
        inner.map.retain(|(ns, _), _| ns != namespace);
        before - inner.map.len()
    }

    /// Remove all entries. Returns the count removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.map.len();
        inner.map.clear();
        count
    }

    /// Drop every expired entry. Returns the count removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.map.len();
        inner.map.retain(|_, entry| now <= entry.expire_at);
        let purged = before - inner.map.len();
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    /// Number of live entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn cached_none_is_distinct_from_miss() {
        let cache: TtlCache<String> = TtlCache::new();

        cache.set("user", "42", None, Some(Duration::from_secs(60)));
        assert_eq!(cache.get("user", "42"), Lookup::NegativeHit);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("user", "42"), Lookup::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new();
        cache.set("t", "k", Some(1u32), Some(Duration::from_secs(10)));
        assert_eq!(cache.get("t", "k"), Lookup::Hit(1));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("t", "k").is_miss());
        // The expired entry was dropped on read.
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn get_or_fetch_caches_negative_results() {
        let cache: TtlCache<String> = TtlCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(
                    "user",
                    "404",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    },
                    None,
                    DEFAULT_NONE_TTL,
                )
                .await
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "negative result must be served from cache");
    }

    #[tokio::test]
    async fn get_or_fetch_propagates_errors_uncached() {
        let cache: TtlCache<u32> = TtlCache::new();
        let result = cache
            .get_or_fetch(
                "t",
                "k",
                || async { Err(crate::Error::client("down")) },
                None,
                DEFAULT_NONE_TTL,
            )
            .await;
        assert!(result.is_err());
        assert!(cache.get("t", "k").is_miss(), "errors must not be cached");
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_targets_nearest_expiry() {
        let cache = TtlCache::with_ttl(DEFAULT_TTL, 2);
        cache.set("n", "soon", Some(1u32), Some(Duration::from_secs(5)));
        cache.set("n", "late", Some(2u32), Some(Duration::from_secs(500)));
        cache.set("n", "new", Some(3u32), Some(Duration::from_secs(100)));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("n", "soon").is_miss(), "nearest-expiry entry should be evicted");
        assert_eq!(cache.get("n", "late"), Lookup::Hit(2));
        assert_eq!(cache.get("n", "new"), Lookup::Hit(3));
    }

    #[test]
    fn poisoned_lock_recovers_with_contents_intact() {
        let cache = std::sync::Arc::new(TtlCache::<u32>::new());
        cache.set("n", "k", Some(1), None);

        let holder = std::sync::Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("holder dies while locked");
        })
        .join();

        assert_eq!(cache.get("n", "k"), Lookup::Hit(1));
        cache.set("n", "k2", Some(2), None);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_and_invalidate() {
        let cache = TtlCache::new();
        cache.set("a", "1", Some(1u32), Some(Duration::from_secs(5)));
        cache.set("a", "2", Some(2u32), Some(Duration::from_secs(500)));
        cache.set("b", "1", Some(3u32), Some(Duration::from_secs(500)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.invalidate("a"), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear(), 1);
    }
}
