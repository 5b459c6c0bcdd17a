//! Response models for the cache server API
//!
//! DTOs serialized into the bodies of the cache's own endpoints.

pub mod responses;

// Re-export commonly used types
pub use responses::{HealthResponse, StatsResponse};
