//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror. None of these errors ever
//! reach an HTTP client: the middleware logs them and serves uncached.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the disk cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A cache directory (base or per-entry) could not be created
    #[error("failed to create cache directory {}: {}", .path.display(), .source)]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cache file could not be opened for writing
    #[error("failed to open cache file {} for writing: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing body bytes to a cache file failed
    #[error("failed to write cache file {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Flushing, measuring or moving a finished cache file failed
    #[error("failed to save cache file {}: {}", .path.display(), .source)]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache file was poisoned by an earlier failure and thrown away
    #[error("cache file {} abandoned after an earlier failure", .0.display())]
    Abandoned(PathBuf),
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, CacheError>;
