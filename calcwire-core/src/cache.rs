//! Fixed-capacity LRU cache engine.
//!
//! One [`CacheEngine`] instance lives inside each server or proxy process and
//! is shared by every connection task through cheap clones. The table is
//! guarded by a single [`parking_lot::Mutex`] held only for the duration of a
//! `get` or `set`; callers compute misses outside the lock, so two concurrent
//! misses on the same key may both compute and both `set`.
//!
//! ```text
//!  get(k) hit ──▶ k becomes most recent
//!  set(k, v)  ──▶ k inserted/overwritten as most recent
//!                 len > capacity ──▶ least recent entry evicted
//! ```

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// Snapshot of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored.
    pub len: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Lookups that found a value.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Calls to `set`.
    pub insertions: u64,
    /// Entries removed to make room.
    pub evictions: u64,
}

/// Thread-safe LRU key→value store.
pub struct CacheEngine<K: Hash + Eq, V: Clone> {
    inner: Arc<Mutex<CacheInner<K, V>>>,
}

struct CacheInner<K: Hash + Eq, V> {
    table: LruCache<K, V>,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
}

impl<K: Hash + Eq, V: Clone> CacheEngine<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                table: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                insertions: 0,
                evictions: 0,
            })),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let found = inner.table.get(key).cloned();
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Insert or overwrite `key` as most recently used, evicting the least
    /// recently used entry if the cache would exceed its capacity.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        inner.insertions += 1;
        // `push` hands back the displaced pair: the old value for an
        // overwrite, or the evicted LRU entry under a different key.
        if let Some((old_key, _)) = inner.table.push(key, value) {
            if !inner.table.contains(&old_key) {
                inner.evictions += 1;
            }
        }
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().table.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().table.cap().get()
    }

    /// Counters and size at this instant.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            len: inner.table.len(),
            capacity: inner.table.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            insertions: inner.insertions,
            evictions: inner.evictions,
        }
    }
}

impl<K: Hash + Eq, V: Clone> Clone for CacheEngine<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq, V: Clone> std::fmt::Debug for CacheEngine<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("stats", &self.stats())
            .finish()
    }
}
