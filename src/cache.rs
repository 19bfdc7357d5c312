//! Size-bounded content cache.
//!
//! Not LRU: once the cumulative size of cached files passes the threshold,
//! the whole map is dropped and filling starts over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, info};

/// Default flush threshold (2 MiB).
pub const DEFAULT_CACHE_LIMIT: usize = 2 << 20;

#[derive(Default)]
struct Entries {
    map: HashMap<String, Bytes>,
    total_size: usize,
}

/// Counters describing how the cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub flushes: u64,
}

pub struct ContentCache {
    entries: Mutex<Entries>,
    threshold: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    flushes: AtomicU64,
}

impl ContentCache {
    pub fn new(threshold: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            threshold,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    // Every mutation finishes before its guard drops, so a poisoned lock
    // still holds a consistent map.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_get(&self, key: &str) -> Option<Bytes> {
        let found = self.lock().map.get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert `data` under `key`.
    ///
    /// Returns `true` when the insertion pushed the total over the threshold
    /// and the cache (new entry included) was cleared.
    pub fn put(&self, key: &str, data: Bytes) -> bool {
        let mut entries = self.lock();
        let added = data.len();
        if let Some(old) = entries.map.insert(key.to_string(), data) {
            entries.total_size -= old.len();
        }
        entries.total_size += added;
        debug!(key, size = added, total = entries.total_size, "caching");

        if entries.total_size <= self.threshold {
            return false;
        }

        info!(
            total = entries.total_size,
            threshold = self.threshold,
            files = entries.map.len(),
            "flushing cache"
        );
        entries.map.clear();
        entries.total_size = 0;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.total_size = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.lock().total_size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIMIT)
    }
}
