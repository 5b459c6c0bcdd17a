//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_CAPACITY_BYTES;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum total size of cached bodies in bytes
    pub capacity_bytes: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Directory served as the origin behind the cache
    pub root_dir: PathBuf,
    /// Directory in which the per-process cache directory is created
    pub cache_parent: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cached bytes (default: 1 MiB)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ROOT_DIR` - Directory to serve (default: current directory)
    /// - `CACHE_PARENT` - Where the cache directory goes (default: system temp dir)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity_bytes: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.capacity_bytes),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            root_dir: env::var_os("ROOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.root_dir),
            cache_parent: env::var_os("CACHE_PARENT")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_parent),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            server_port: 3000,
            root_dir: PathBuf::from("."),
            cache_parent: env::temp_dir(),
        }
    }
}
