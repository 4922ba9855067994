//! Bounded, date-keyed LRU cache of APOD records
use crate::domain::{ApodRecord, DateKey};
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

/// Default number of days kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// LRU cache keyed by calendar day.
///
/// Both `get` hits and `put` count as use. Not synchronised; the pipeline
/// keeps it behind a mutex.
pub struct DateKeyedCache {
    entries: LruCache<DateKey, ApodRecord>,
}

impl DateKeyedCache {
    /// Create a cache holding at most `capacity` days (zero is clamped to one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a day, marking it as most recently used
    pub fn get(&mut self, key: &DateKey) -> Option<&ApodRecord> {
        let hit = self.entries.get(key);
        debug!(date = %key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Look up a day without touching recency
    pub fn peek(&self, key: &DateKey) -> Option<&ApodRecord> {
        self.entries.peek(key)
    }

    /// Insert or overwrite a day, evicting the least recently used one if full
    pub fn put(&mut self, key: DateKey, value: ApodRecord) {
        if let Some((evicted, _)) = self.entries.push(key, value) {
            if evicted != key {
                debug!(date = %evicted, "evicted from cache");
            }
        }
    }

    pub fn contains(&self, key: &DateKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for DateKeyedCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
