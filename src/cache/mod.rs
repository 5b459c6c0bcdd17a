//! Cache Module
//!
//! Provides the on-disk response cache: key mapping, the size-bounded LRU
//! index, the disk store and the shared cache engine tying them together.

mod disk;
mod entry;
mod key;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use disk::{CacheFile, DiskStore, PARTIAL_DIR};
pub use entry::{DiskEntry, PurgeReason, Purged};
pub use key::{cache_key, request_host, CacheKey, DEFAULT_HOST};
pub use self::lru::LruIndex;
pub use stats::CacheStats;
pub use store::DiskCache;

// == Public Constants ==
/// Response header carrying the cache admission signal and the hit/miss status
pub const CACHE_HEADER: &str = "x-cache";

/// Response header telling whether a handler-produced body is being written
/// to disk ("1") or not ("0")
pub const CACHED_HEADER: &str = "x-cached";

/// Value of [`CACHE_HEADER`] on responses served from disk
pub const CACHE_HIT: &str = "Hit";

/// Value of [`CACHE_HEADER`] on admitted responses produced by the handler
pub const CACHE_MISS: &str = "Miss";

/// Default maximum total size of cached bodies
pub const DEFAULT_CAPACITY_BYTES: u64 = 1 << 20; // 1 MiB

/// Name prefix of the per-process base cache directory
pub const CACHE_DIR_PREFIX: &str = "disk-cache-";
