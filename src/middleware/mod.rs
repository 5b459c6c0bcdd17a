//! Middleware Module
//!
//! The disk cache as an axum middleware, and the deferred-decision body
//! writer it installs on admitted responses.
//!
//! # Usage
//! ```ignore
//! let cache = DiskCache::in_dir(&std::env::temp_dir(), DEFAULT_CAPACITY_BYTES)?;
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(cache, disk_cache_layer));
//! ```

mod cache;
mod intercept;

pub use cache::disk_cache_layer;
pub use intercept::{BodyInterceptor, ClientSink};
