//! LRU Index Module
//!
//! In-memory index of cached bodies, bounded by the total size of the files
//! it references rather than by entry count.

use lru::LruCache;

use crate::cache::{CacheKey, CacheStats, DiskEntry, Purged};

// == LRU Index ==
/// Maps cache keys to disk entries, ordered by recency of access.
///
/// Invariant: `used_bytes() <= capacity_bytes()` after every call to
/// [`LruIndex::set`]. Entries leaving the index are returned as [`Purged`]
/// records; the index itself never touches the filesystem.
pub struct LruIndex {
    /// Entries, most recently used first
    entries: LruCache<CacheKey, DiskEntry>,
    /// Sum of `size_bytes` over all entries
    used_bytes: u64,
    /// Maximum allowed `used_bytes`
    capacity_bytes: u64,
    /// Performance statistics
    stats: CacheStats,
}

impl LruIndex {
    // == Constructor ==
    /// Creates an empty index holding at most `capacity_bytes` of entries.
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            used_bytes: 0,
            capacity_bytes,
            stats: CacheStats::new(capacity_bytes),
        }
    }

    // == Get ==
    /// Looks up an entry and marks it most recently used.
    ///
    /// A missing key counts as a miss. A found key is not counted until the
    /// caller reports the outcome with [`LruIndex::record_hit`] or
    /// [`LruIndex::remove_stale`].
    pub fn get(&mut self, key: &CacheKey) -> Option<DiskEntry> {
        let found = self.entries.get(key).cloned();
        if found.is_none() {
            self.stats.record_miss();
        }
        found
    }

    /// Counts a lookup whose body was actually served.
    pub fn record_hit(&mut self) {
        self.stats.record_hit();
    }

    // == Set ==
    /// Inserts or replaces an entry, marks it most recently used, then evicts
    /// least recently used entries until the index fits its capacity again.
    ///
    /// The entry just inserted is evicted too if it alone exceeds capacity.
    /// Returns every entry that left the index, in removal order.
    pub fn set(&mut self, key: CacheKey, entry: DiskEntry) -> Vec<Purged> {
        let mut purged = Vec::new();

        self.used_bytes = self.used_bytes.saturating_add(entry.size_bytes);
        if let Some((_key, old)) = self.entries.push(key, entry) {
            self.used_bytes = self.used_bytes.saturating_sub(old.size_bytes);
            purged.push(Purged::replaced(old));
        }

        while self.used_bytes > self.capacity_bytes {
            let Some((_key, oldest)) = self.entries.pop_lru() else {
                break;
            };
            self.used_bytes = self.used_bytes.saturating_sub(oldest.size_bytes);
            self.stats.record_eviction();
            purged.push(Purged::evicted(oldest));
        }

        self.refresh_usage();
        purged
    }

    // == Remove ==
    /// Drops an entry without producing a purge record. Used when the backing
    /// file is already known to be gone.
    pub fn remove(&mut self, key: &CacheKey) -> Option<DiskEntry> {
        let removed = self.entries.pop(key)?;
        self.used_bytes = self.used_bytes.saturating_sub(removed.size_bytes);
        self.refresh_usage();
        Some(removed)
    }

    /// Drops `entry` after its file turned out to be missing, and counts the
    /// lookup that found it as a miss.
    ///
    /// Nothing is removed if `key` has since been registered again with a
    /// different entry.
    pub fn remove_stale(&mut self, key: &CacheKey, entry: &DiskEntry) -> bool {
        self.stats.record_miss();
        if self.entries.peek(key) != Some(entry) {
            return false;
        }
        self.remove(key).is_some()
    }

    /// Checks for a key without touching its recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn refresh_usage(&mut self) {
        self.stats.set_usage(self.entries.len(), self.used_bytes);
    }
}
