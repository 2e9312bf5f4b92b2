//! LRU cache for decompressed payloads
//!
//! Advisory read-path acceleration only: entries are invalidated on every
//! store of the same key, and nothing here participates in correctness
//! decisions.

use super::integrity::Digest;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache of decompressed payloads keyed by namespace-qualified key
pub struct PayloadCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone)]
struct CacheEntry {
    checksum: Digest,
    payload: Vec<u8>,
}

impl PayloadCache {
    /// Create a new cache with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1000).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a cached payload and the checksum it was stored under
    pub fn get(&self, key: &str) -> Option<(Digest, Vec<u8>)> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some((entry.checksum, entry.payload.clone()))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert a decompressed payload
    pub fn put(&self, key: String, checksum: Digest, payload: Vec<u8>) {
        let mut cache = self.cache.lock();
        cache.put(key, CacheEntry { checksum, payload });
    }

    /// Drop a key after its entry was overwritten
    pub fn invalidate(&self, key: &str) {
        let mut cache = self.cache.lock();
        cache.pop(key);
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
    }

    /// Hit/miss statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        let cache = self.cache.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: cache.len(),
            capacity: cache.cap().get(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
}
