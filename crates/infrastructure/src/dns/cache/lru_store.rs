use danse_application::ports::{CachedResponse, ResponseCache};
use danse_application::services::CacheKey;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// In-memory response cache with least-recently-used eviction.
///
/// Expired entries are not swept; they stay until overwritten or evicted.
pub struct LruResponseCache {
    entries: Mutex<LruCache<CacheKey, CachedResponse>>,
    capacity: NonZeroUsize,
}

impl LruResponseCache {
    /// `max_items` is clamped to at least one entry.
    pub fn new(max_items: usize) -> Self {
        let capacity = NonZeroUsize::new(max_items).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CachedResponse>> {
        // Entries are plain values; a poisoned lock still holds a usable map.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: CacheKey, entry: CachedResponse) {
        self.lock().put(key, entry);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
