//! API Handlers
//!
//! Handlers for the cache's own endpoints, and the admission layer that
//! opts origin responses into caching.

use std::path::PathBuf;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};

use crate::cache::{DiskCache, CACHE_HEADER};
use crate::config::Config;
use crate::error::Result;
use crate::models::{HealthResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Disk cache in front of the origin
    pub cache: DiskCache,
    /// Directory served by the origin
    pub root_dir: PathBuf,
}

impl AppState {
    /// Creates a new AppState with the given cache and origin directory.
    pub fn new(cache: DiskCache, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            root_dir: root_dir.into(),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails if the cache directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = DiskCache::in_dir(&config.cache_parent, config.capacity_bytes)?;
        Ok(Self::new(cache, config.root_dir.clone()))
    }
}

/// Handler for GET /_cache/stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /_cache/health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Origin-side admission: every successful origin response may be cached.
pub async fn admit_successful(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if response.status() == StatusCode::OK {
        response
            .headers_mut()
            .insert(CACHE_HEADER, HeaderValue::from_static("1"));
    }
    response
}
