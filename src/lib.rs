//! Disk Cache - A disk-backed, size-bounded HTTP response cache
//!
//! Sits in front of an axum handler, stores admitted response bodies on disk
//! while streaming them to the client, and serves repeated requests from
//! disk. An LRU index bounded by total bytes evicts old bodies.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;

pub use api::AppState;
pub use cache::DiskCache;
pub use config::Config;
pub use middleware::disk_cache_layer;
