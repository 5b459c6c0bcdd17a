//! Cache Key Module
//!
//! Maps a request's host and URL path onto a file location below the cache
//! base directory, or rejects the request as uncacheable.

use std::fmt;
use std::path::{Path, PathBuf};

use axum::http::{header, HeaderMap, Uri};

/// Host used when the request carries none.
pub const DEFAULT_HOST: &str = "localhost";

// == Cache Key ==
/// Identifies a cacheable request. The key is the path of its cache file,
/// `<base>/<host>/<url-path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(PathBuf);

impl CacheKey {
    /// Path of the cache file backing this key.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Returns the host a request is addressed to: the `Host` header, then the
/// URI authority, then [`DEFAULT_HOST`].
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> &'a str {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_HOST)
}

// == Path Mapping ==
/// Derives the cache key for a request, or `None` when it must not be cached.
///
/// Uncacheable requests:
/// - a non-empty query string (parametrized responses are not distinguished)
/// - a path ending in `/` (directory index naming is ambiguous)
/// - a `..` path segment, or a host containing a separator or starting with
///   `.` (would escape the host directory or collide with store internals)
pub fn cache_key(base_dir: &Path, host: &str, uri: &Uri) -> Option<CacheKey> {
    if uri.query().is_some_and(|query| !query.is_empty()) {
        return None;
    }

    let path = uri.path();
    if path.ends_with('/') {
        return None;
    }

    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    if !is_safe_host(host) {
        return None;
    }

    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }

    Some(CacheKey(base_dir.join(host).join(relative)))
}

fn is_safe_host(host: &str) -> bool {
    !host.starts_with('.') && !host.contains(|c| c == '/' || c == '\\')
}
