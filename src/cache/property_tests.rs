//! Property-Based Tests for the LRU Index
//!
//! Uses proptest to check the capacity and ordering guarantees of the index
//! over arbitrary insert/lookup sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::path::Path;

use axum::http::Uri;

use crate::cache::{cache_key, CacheKey, DiskEntry, LruIndex, PurgeReason};

// == Test Configuration ==
const TEST_CAPACITY: u64 = 1_000;

// == Strategies ==
/// Generates request paths that always map to a cache key
fn valid_path_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,16}(/[a-z0-9_]{1,16}){0,2}".prop_map(|s| format!("/{}", s))
}

fn size_strategy() -> impl Strategy<Value = u64> {
    0u64..400
}

#[derive(Debug, Clone)]
enum IndexOp {
    Set { path: String, size: u64 },
    Get { path: String },
}

fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        (valid_path_strategy(), size_strategy())
            .prop_map(|(path, size)| IndexOp::Set { path, size }),
        valid_path_strategy().prop_map(|path| IndexOp::Get { path }),
    ]
}

fn key(path: &str) -> CacheKey {
    let uri: Uri = path.parse().unwrap();
    cache_key(Path::new("/cache"), "localhost", &uri).unwrap()
}

fn entry(path: &str, size: u64) -> DiskEntry {
    DiskEntry::new(key(path).path(), size)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // After every set, the indexed bytes fit the capacity and equal the sum
    // of the entries still present.
    #[test]
    fn prop_capacity_enforcement(ops in prop::collection::vec(index_op_strategy(), 1..100)) {
        let mut index = LruIndex::new(TEST_CAPACITY);
        let mut sizes = std::collections::HashMap::new();

        for op in ops {
            match op {
                IndexOp::Set { path, size } => {
                    let purged = index.set(key(&path), entry(&path, size));
                    sizes.insert(key(&path), size);
                    for record in purged {
                        if record.reason == PurgeReason::Evicted {
                            sizes.retain(|k, _| k.path() != record.entry.path());
                        }
                    }
                    prop_assert!(
                        index.used_bytes() <= TEST_CAPACITY,
                        "used {} exceeds capacity {}",
                        index.used_bytes(),
                        TEST_CAPACITY
                    );
                }
                IndexOp::Get { path } => {
                    let _ = index.get(&key(&path));
                }
            }
        }

        let expected: u64 = sizes.values().sum();
        prop_assert_eq!(index.used_bytes(), expected);
        prop_assert_eq!(index.len(), sizes.len());
    }

    // Every removal produces exactly one purge record, and an evicted key is
    // no longer indexed.
    #[test]
    fn prop_purge_records_match_removals(
        entries in prop::collection::vec((valid_path_strategy(), size_strategy()), 1..60)
    ) {
        let mut index = LruIndex::new(TEST_CAPACITY);
        let mut inserted = 0usize;
        let mut purged_total = 0usize;

        for (path, size) in entries {
            let existed = index.contains(&key(&path));
            let purged = index.set(key(&path), entry(&path, size));
            if !existed {
                inserted += 1;
            }
            purged_total += purged
                .iter()
                .filter(|record| record.reason == PurgeReason::Evicted)
                .count();

            let replaced = purged
                .iter()
                .filter(|record| record.reason == PurgeReason::Replaced)
                .count();
            prop_assert_eq!(replaced, usize::from(existed));

            for record in purged.iter().filter(|r| r.reason == PurgeReason::Evicted) {
                prop_assert!(index.keys().iter().all(|k| k.path() != record.entry.path()));
            }
        }

        prop_assert_eq!(inserted, index.len() + purged_total);
    }

    // The most recently set entry survives whenever it fits on its own.
    #[test]
    fn prop_latest_entry_retained(
        entries in prop::collection::vec((valid_path_strategy(), size_strategy()), 1..60)
    ) {
        let mut index = LruIndex::new(TEST_CAPACITY);

        for (path, size) in entries {
            index.set(key(&path), entry(&path, size));
            prop_assert!(index.contains(&key(&path)));
            let keys = index.keys();
            let latest = key(&path);
            prop_assert_eq!(keys.first(), Some(&latest));
        }
    }

    // Eviction removes entries strictly from the least recently used end:
    // survivors are always a prefix of the recency order before the insert.
    #[test]
    fn prop_lru_eviction_order(
        paths in prop::collection::vec(valid_path_strategy(), 2..20),
        new_path in valid_path_strategy(),
        new_size in 1u64..TEST_CAPACITY
    ) {
        let unique: Vec<String> = paths
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        prop_assume!(!unique.contains(&new_path));

        let mut index = LruIndex::new(TEST_CAPACITY);
        for path in &unique {
            index.set(key(path), entry(path, 100));
        }

        let before = index.keys();
        index.set(key(&new_path), entry(&new_path, new_size));
        let after = index.keys();

        let newest = key(&new_path);
        prop_assert_eq!(after.first(), Some(&newest));
        let survivors = &after[1..];
        prop_assert_eq!(survivors, &before[..survivors.len()]);
    }
}
