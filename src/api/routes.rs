//! API Routes
//!
//! Configures the Axum router: the cache's own endpoints, and a static
//! origin behind the disk cache for everything else.

use axum::{middleware, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::handlers::{admit_successful, health_handler, stats_handler, AppState};
use crate::middleware::disk_cache_layer;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /_cache/stats` - Cache statistics
/// - `GET /_cache/health` - Health check endpoint
/// - anything else - Files from the root directory, through the disk cache
///
/// # Middleware
/// - Disk cache in front of the origin, admission marking 200 responses
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let origin = Router::new()
        .fallback_service(ServeDir::new(&state.root_dir))
        .layer(middleware::from_fn(admit_successful))
        .layer(middleware::from_fn_with_state(
            state.cache.clone(),
            disk_cache_layer,
        ));

    Router::new()
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/health", get(health_handler))
        .fallback_service(origin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
