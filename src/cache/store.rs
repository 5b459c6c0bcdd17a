//! Disk Cache Module
//!
//! Main cache engine combining the LRU index with the disk store. One
//! instance is owned by each middleware stack and shared between requests.

use std::path::Path;
use std::sync::Arc;

use axum::http::Uri;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    cache_key, CacheFile, CacheKey, CacheStats, DiskEntry, DiskStore, LruIndex, CACHE_DIR_PREFIX,
};
use crate::error::Result;

// == Disk Cache ==
/// Shared, lock-protected cache state.
///
/// The index lock is only held for bookkeeping; all file I/O happens outside
/// of it.
#[derive(Clone)]
pub struct DiskCache {
    /// Recency-ordered index of cached bodies
    index: Arc<RwLock<LruIndex>>,
    /// File lifecycle below the base directory
    disk: Arc<DiskStore>,
}

impl DiskCache {
    // == Constructors ==
    /// Creates a cache in a fresh directory under `parent`.
    ///
    /// # Arguments
    /// * `parent` - Directory the per-instance cache directory is created in
    /// * `capacity_bytes` - Maximum total size of all cached bodies
    pub fn in_dir(parent: &Path, capacity_bytes: u64) -> Result<Self> {
        let disk = DiskStore::create_temp(parent, CACHE_DIR_PREFIX)?;
        info!(
            "Disk cache created at {} with capacity of {} bytes",
            disk.base_dir().display(),
            capacity_bytes
        );
        Ok(Self::with_store(disk, capacity_bytes))
    }

    /// Wraps an existing store.
    pub fn with_store(disk: DiskStore, capacity_bytes: u64) -> Self {
        Self {
            index: Arc::new(RwLock::new(LruIndex::new(capacity_bytes))),
            disk: Arc::new(disk),
        }
    }

    /// Directory all cache files live under.
    pub fn base_dir(&self) -> &Path {
        self.disk.base_dir()
    }

    /// Maps a request onto its cache key; `None` if it is not cacheable.
    pub fn key_for(&self, host: &str, uri: &Uri) -> Option<CacheKey> {
        cache_key(self.base_dir(), host, uri)
    }

    // == Lookup ==
    /// Finds the entry for `key`, marking it most recently used.
    ///
    /// The lookup counts as a hit only once [`DiskCache::record_hit`]
    /// confirms the body was served.
    pub async fn lookup(&self, key: &CacheKey) -> Option<DiskEntry> {
        self.index.write().await.get(key)
    }

    pub async fn record_hit(&self) {
        self.index.write().await.record_hit();
    }

    // == Insert ==
    /// Registers a finished body file and purges whatever that pushes out.
    ///
    /// Every purge has completed by the time this returns.
    pub async fn insert(&self, key: CacheKey, entry: DiskEntry) {
        debug!(key = %key, size = entry.size_bytes, "registering cache entry");
        let purged = {
            let mut index = self.index.write().await;
            index.set(key, entry)
        };

        for record in &purged {
            self.disk.purge(record).await;
        }
    }

    // == Forget ==
    /// Drops `entry` after its file disappeared from under the index.
    ///
    /// A newer entry registered for `key` in the meantime is left alone.
    pub async fn forget(&self, key: &CacheKey, entry: &DiskEntry) {
        if self.index.write().await.remove_stale(key, entry) {
            debug!(key = %key, "forgot cache entry without a file");
        }
    }

    // == Write Path ==
    /// Opens the cache file for `key`, or `None` if the response should go
    /// uncached.
    pub async fn open_for_write(&self, key: &CacheKey) -> Option<CacheFile> {
        match self.disk.open_for_write(key.path()).await {
            Ok(file) => Some(file),
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }

    /// Throws away a cache file that never received a body.
    pub async fn abandon(&self, file: CacheFile) {
        self.disk.abandon(file).await;
    }

    /// Finalizes a written cache file and registers it under `key`.
    pub async fn complete(&self, key: CacheKey, file: CacheFile) {
        match self.disk.finalize(file).await {
            Ok(entry) => self.insert(key, entry).await,
            Err(err) => warn!("Could not save cache file: {}", err),
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.index.read().await.stats()
    }

    /// Whether `key` is indexed, without touching its recency.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.index.read().await.contains(key)
    }

    pub async fn used_bytes(&self) -> u64 {
        self.index.read().await.used_bytes()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: u64) -> (tempfile::TempDir, DiskCache) {
        let parent = tempfile::tempdir().unwrap();
        let cache = DiskCache::in_dir(parent.path(), capacity).unwrap();
        (parent, cache)
    }

    fn key(cache: &DiskCache, path: &str) -> CacheKey {
        cache.key_for("localhost", &path.parse().unwrap()).unwrap()
    }

    async fn store_body(cache: &DiskCache, key: &CacheKey, body: &[u8]) {
        let mut file = cache.open_for_write(key).await.unwrap();
        file.write(body).await;
        cache.complete(key.clone(), file).await;
    }

    #[tokio::test]
    async fn test_cache_new_creates_base_dir() {
        let (_parent, cache) = cache(1024);
        assert!(cache.base_dir().is_dir());
        assert_eq!(cache.stats().await.capacity_bytes, 1024);
    }

    #[tokio::test]
    async fn test_complete_registers_entry() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");

        store_body(&cache, &key, b"body").await;

        let entry = cache.lookup(&key).await.unwrap();
        assert_eq!(entry.size_bytes, 4);
        assert_eq!(std::fs::read(entry.path()).unwrap(), b"body");
    }

    #[tokio::test]
    async fn test_eviction_removes_file() {
        // capacity 10: A (6) then B (6) leaves only B on disk
        let (_parent, cache) = cache(10);
        let a = key(&cache, "/a");
        let b = key(&cache, "/b");

        store_body(&cache, &a, b"aaaaaa").await;
        store_body(&cache, &b, b"bbbbbb").await;

        assert!(!cache.contains(&a).await);
        assert!(cache.contains(&b).await);
        assert!(!a.path().exists());
        assert!(b.path().exists());
        assert_eq!(cache.used_bytes().await, 6);
    }

    #[tokio::test]
    async fn test_replacing_entry_keeps_new_file() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");

        store_body(&cache, &key, b"first").await;
        store_body(&cache, &key, b"second").await;

        assert_eq!(std::fs::read(key.path()).unwrap(), b"second");
        assert_eq!(cache.used_bytes().await, 6);
    }

    #[tokio::test]
    async fn test_poisoned_file_is_not_registered() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");

        let mut file = cache.open_for_write(&key).await.unwrap();
        file.write(b"half").await;
        file.poison();
        cache.complete(key.clone(), file).await;

        assert!(!cache.contains(&key).await);
        assert!(!key.path().exists());
    }

    #[tokio::test]
    async fn test_forget_drops_entry() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");
        store_body(&cache, &key, b"x").await;

        let entry = cache.lookup(&key).await.unwrap();
        cache.forget(&key, &entry).await;
        assert!(!cache.contains(&key).await);
        assert_eq!(cache.used_bytes().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_forget_keeps_entry_stored_again() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");
        store_body(&cache, &key, b"x").await;
        let stale = cache.lookup(&key).await.unwrap();

        // Another request stores the same body before the stale entry is dropped
        store_body(&cache, &key, b"x").await;
        cache.forget(&key, &stale).await;

        assert!(cache.contains(&key).await);
        assert!(key.path().exists());
        assert_eq!(cache.used_bytes().await, 1);
    }

    #[tokio::test]
    async fn test_hit_counted_only_when_recorded() {
        let (_parent, cache) = cache(1024);
        let key = key(&cache, "/a.txt");
        store_body(&cache, &key, b"x").await;

        cache.lookup(&key).await.unwrap();
        assert_eq!(cache.stats().await.hits, 0);

        cache.record_hit().await;
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_instances_do_not_share_state() {
        let (_p1, first) = cache(1024);
        let (_p2, second) = cache(1024);
        let key = key(&first, "/a.txt");
        store_body(&first, &key, b"x").await;

        assert_ne!(first.base_dir(), second.base_dir());
        assert!(second.lookup(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_respect_capacity() {
        let (_parent, cache) = cache(50);
        let mut handles = Vec::new();
        for i in 0..20 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = key(&cache, &format!("/item-{}", i));
                store_body(&cache, &key, b"0123456789").await;
                key
            }));
        }

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }

        assert!(cache.used_bytes().await <= 50);
        for key in &keys {
            assert_eq!(cache.contains(key).await, key.path().exists(), "{}", key);
        }
    }
}
