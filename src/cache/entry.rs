//! Disk Entry Module
//!
//! Defines the metadata tracked for each cached response body, and the purge
//! records the index hands back when entries leave it.

use std::path::{Path, PathBuf};

// == Disk Entry ==
/// One cached response body persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    /// Location of the body file
    pub path: PathBuf,
    /// Size of the body file in bytes
    pub size_bytes: u64,
    /// Distinguishes successive bodies stored at the same path
    pub generation: u64,
}

impl DiskEntry {
    // == Constructor ==
    /// Creates a new entry for a fully written body file.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Location of the body file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// == Purge Reason ==
/// Why an entry left the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReason {
    /// Removed to bring the index back under capacity
    Evicted,
    /// Overwritten by a newer entry for the same key
    Replaced,
}

// == Purged ==
/// An entry that has been removed from the index and whose backing file
/// still has to be dealt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purged {
    pub entry: DiskEntry,
    pub reason: PurgeReason,
}

impl Purged {
    pub fn evicted(entry: DiskEntry) -> Self {
        Self {
            entry,
            reason: PurgeReason::Evicted,
        }
    }

    pub fn replaced(entry: DiskEntry) -> Self {
        Self {
            entry,
            reason: PurgeReason::Replaced,
        }
    }
}
