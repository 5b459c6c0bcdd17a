//! API Module
//!
//! HTTP handlers and routing for the cache server.
//!
//! # Endpoints
//! - `GET /_cache/stats` - Get cache statistics
//! - `GET /_cache/health` - Health check endpoint
//! - everything else - Static origin behind the disk cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
