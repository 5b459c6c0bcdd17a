//! Disk cache middleware.
//!
//! Serves cached bodies straight from disk, and tees admitted responses of
//! the wrapped handler into the cache while they stream to the client.

use std::io;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, instrument, warn};

use super::intercept::{BodyInterceptor, ClientSink};
use crate::cache::{
    request_host, CacheFile, CacheKey, DiskCache, DiskEntry, CACHED_HEADER, CACHE_HEADER,
    CACHE_HIT, CACHE_MISS,
};

/// Body chunks buffered between the cache writer and a slow client.
const CLIENT_BUFFER: usize = 16;

/// Middleware for the disk response cache.
///
/// The wrapped handler opts a response in by setting a non-empty
/// `X-Cache` header; the outgoing response then carries `X-Cache: Miss`,
/// and later identical requests are answered from disk with `X-Cache: Hit`.
/// Responses produced by the handler for a cacheable request also carry
/// `X-Cached: 1` if their body is being written to disk and `X-Cached: 0`
/// otherwise.
/// Requests with a query string or a trailing `/`, and methods other than
/// GET and HEAD, always go straight to the handler.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn disk_cache_layer(
    State(cache): State<DiskCache>,
    request: Request,
    next: Next,
) -> Response {
    if !is_cacheable_method(request.method()) {
        return pass_through(request, next).await;
    }

    let host = request_host(request.headers(), request.uri());
    let Some(key) = cache.key_for(host, request.uri()) else {
        debug!("request is not cacheable");
        return pass_through(request, next).await;
    };

    if let Some(entry) = cache.lookup(&key).await {
        let bodiless = file_request(&request);
        match serve_from_disk(&entry, bodiless).await {
            Some(response) => {
                cache.record_hit().await;
                debug!(cache = "disk", outcome = "hit", "serving cached body");
                return response;
            }
            None => cache.forget(&key, &entry).await,
        }
    }

    debug!(cache = "disk", outcome = "miss", "running wrapped handler");
    let response = next.run(request).await;
    intercept(cache, key, response).await
}

fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn is_admitted(headers: &HeaderMap) -> bool {
    headers
        .get(CACHE_HEADER)
        .is_some_and(|value| !value.is_empty())
}

/// Runs the handler without caching; the admission signal is not meant for
/// clients.
async fn pass_through(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().remove(CACHE_HEADER);
    response
}

// == Serve From Disk ==
/// Bodiless copy of `request` for the file service.
fn file_request(request: &Request) -> Request {
    let mut copy = Request::new(Body::empty());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.headers_mut() = request.headers().clone();
    copy
}

/// Streams a cached body. Returns `None` if the file has vanished, e.g. a
/// concurrent eviction between lookup and read.
async fn serve_from_disk(entry: &DiskEntry, request: Request) -> Option<Response> {
    let response = match ServeFile::new(entry.path()).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    if response.status() == StatusCode::NOT_FOUND {
        warn!(
            "Cached file {} disappeared, falling back to handler",
            entry.path().display()
        );
        return None;
    }

    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static(CACHE_HIT));
    Some(response)
}

// == Intercept ==
/// Hands an admitted response's body to a cache writer task and returns a
/// response streaming the same bytes to the client.
///
/// `X-Cached` goes out with the response head, so the cache file is opened
/// before the first body chunk arrives. A body known to be empty gets no
/// file.
async fn intercept(cache: DiskCache, key: CacheKey, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    if !is_admitted(&parts.headers) {
        parts
            .headers
            .insert(CACHED_HEADER, HeaderValue::from_static("0"));
        return Response::from_parts(parts, body);
    }
    parts
        .headers
        .insert(CACHE_HEADER, HeaderValue::from_static(CACHE_MISS));

    let size = body.size_hint().exact();
    if let Some(len) = size.filter(|len| *len > 0) {
        if !parts.headers.contains_key(header::CONTENT_LENGTH) {
            parts.headers.insert(header::CONTENT_LENGTH, len.into());
        }
    }

    let file = match size {
        Some(0) => None,
        _ => cache.open_for_write(&key).await,
    };
    let cached = if file.is_some() { "1" } else { "0" };
    parts
        .headers
        .insert(CACHED_HEADER, HeaderValue::from_static(cached));

    let (client, receiver) = mpsc::channel(CLIENT_BUFFER);
    tokio::spawn(pump(cache, key, body, file, client));

    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|frame| (frame, receiver))
    });
    Response::from_parts(parts, Body::from_stream(stream))
}

/// Copies the wrapped body through a [`BodyInterceptor`] until it ends, then
/// registers the cache file. The client stream closes only after the entry
/// is registered.
async fn pump(
    cache: DiskCache,
    key: CacheKey,
    body: Body,
    file: Option<CacheFile>,
    client: ClientSink,
) {
    let mut opened = file;
    let slot = &mut opened;
    let mut interceptor = BodyInterceptor::new(client, move || async move { slot.take() });

    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(chunk) => interceptor.write(chunk).await,
            Err(err) => {
                warn!("Wrapped body for {} failed: {}", key, err);
                interceptor.abort(io::Error::other(err)).await;
                break;
            }
        }
    }

    let (file, client) = interceptor.into_parts();
    if let Some(file) = file {
        cache.complete(key, file).await;
    } else if let Some(unused) = opened.take() {
        cache.abandon(unused).await;
    }
    drop(client);
}
