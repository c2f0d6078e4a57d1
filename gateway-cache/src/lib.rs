//! Bounded, in-process caches.
//!
//! Used by the gateway binary to memoize token counts per request body
//! (avoids re-invoking the backend's counter model for identical prompts
//! within a short window) and to cache detokenizer lookups.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe TTL cache backed by `DashMap`.
///
/// Entries expire after the configured `ttl` and are lazily evicted on access.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Arc<DashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Create a new cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Get a cached value if it exists and hasn't expired.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.inner.get(key) {
            let (val, inserted) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(val.clone());
            }
            drop(entry);
            self.inner.remove(key);
        }
        None
    }

    /// Insert or update a value in the cache.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, (value, Instant::now()));
    }

    /// Remove a specific entry from the cache.
    pub fn remove(&self, key: &K) {
        self.inner.remove(key);
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        self.inner.retain(|_, (_, inserted)| inserted.elapsed() < self.ttl);
    }

    /// Number of live entries, including ones not yet lazily evicted.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Size-bounded TTL cache. Wraps [`TtlCache`] and evicts expired entries
/// before insertion once the map grows past `capacity`, to keep the
/// per-request token-count memo from growing unbounded under sustained
/// traffic with varied prompts.
#[derive(Clone)]
pub struct BoundedTtlCache<K, V> {
    inner: TtlCache<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedTtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: TtlCache::new(ttl),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Insert a value, evicting expired entries first if the cache is at
    /// capacity. If still at capacity after eviction, the new entry is
    /// dropped rather than inserted (read-through callers just recompute).
    pub fn insert(&self, key: K, value: V) {
        if self.inner.len() >= self.capacity {
            self.inner.evict_expired();
        }
        if self.inner.len() < self.capacity {
            self.inner.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
