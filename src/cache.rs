//! Keyed time-to-live memoization for async fetches
//!
//! Every remote lookup (version listings, archive directories, package
//! catalogs, resolved symbols) goes through a [`MemoizingCache`]. Entries live
//! in a concurrent map and are dropped lazily once their TTL has elapsed.
//!
//! Concurrent misses on the same key are not coalesced: each caller runs the
//! fetch and the last write wins. Fetch functions must therefore be idempotent.

use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct MemoizingCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    error_ttl: Duration,
}

impl<K, V> MemoizingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache whose entries expire `ttl` after insertion.
    ///
    /// Failed results (see [`MemoizingCache::get_or_fetch_result`]) use the
    /// same TTL unless overridden with [`MemoizingCache::with_error_ttl`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            error_ttl: ttl,
        }
    }

    /// Override how long failed results stay cached. Zero disables error caching.
    pub fn with_error_ttl(mut self, error_ttl: Duration) -> Self {
        self.error_ttl = error_ttl;
        self
    }

    /// Returns the cached value if present and not expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        // Expired: the read guard above is released before removal
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Keep only the entries whose key satisfies `keep`
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.entries.retain(|key, _| keep(key));
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        debug!("Purged {} expired cache entries", before.saturating_sub(self.entries.len()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value or run `fetch` and cache its output
    pub async fn get_or_insert_with<F, Fut>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }

        let value = fetch().await;
        self.insert(key, value.clone());
        value
    }

    /// Return the cached value or run `fetch`, caching only successes
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

impl<K, T, E> MemoizingCache<K, Result<T, E>>
where
    K: Eq + Hash + Clone,
    T: Clone,
    E: Clone,
{
    /// Return the cached result or run `fetch`.
    ///
    /// Successes are kept for the regular TTL and failures for the error TTL,
    /// so a transient outage is remembered for at most `error_ttl`.
    pub async fn get_or_fetch_result<F, Fut>(&self, key: K, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(result) = self.get(&key) {
            return result;
        }

        let result = fetch().await;
        let ttl = if result.is_ok() {
            self.ttl
        } else {
            self.error_ttl
        };
        self.insert_with_ttl(key, result.clone(), ttl);
        result
    }
}
