//! Body Interceptor
//!
//! Two-phase response body writer. While pending it holds a decision
//! closure; the first chunk runs the closure once and resolves the fan-out to
//! either the client alone or the client plus a cache file.

use std::future::Future;
use std::io;
use std::mem;

use axum::body::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::CacheFile;

/// Client side of the fan-out: frames sent here become the response body.
pub type ClientSink = mpsc::Sender<io::Result<Bytes>>;

enum Sink<D> {
    /// No body bytes seen yet
    Pending(D),
    /// Decided: `Some` tees into a cache file, `None` passes through
    Resolved(Option<CacheFile>),
}

// == Body Interceptor ==
pub struct BodyInterceptor<D> {
    client: Option<ClientSink>,
    sink: Sink<D>,
}

impl<D, F> BodyInterceptor<D>
where
    D: FnOnce() -> F,
    F: Future<Output = Option<CacheFile>>,
{
    /// `decide` runs at most once, on the first written chunk. It is never
    /// called for an empty body.
    pub fn new(client: ClientSink, decide: D) -> Self {
        Self {
            client: Some(client),
            sink: Sink::Pending(decide),
        }
    }

    // == Write ==
    /// Writes one body chunk to every sink.
    ///
    /// A client that has gone away is dropped from the fan-out; the cache
    /// file keeps receiving chunks.
    pub async fn write(&mut self, chunk: Bytes) {
        self.resolve().await;
        if let Sink::Resolved(Some(file)) = &mut self.sink {
            file.write(&chunk).await;
        }
        self.forward(Ok(chunk)).await;
    }

    // == Abort ==
    /// The wrapped body failed: the cache file can no longer be trusted and
    /// the client gets the error.
    pub async fn abort(&mut self, err: io::Error) {
        if let Sink::Resolved(Some(file)) = &mut self.sink {
            file.poison();
        }
        self.forward(Err(err)).await;
    }

    async fn resolve(&mut self) {
        if !matches!(self.sink, Sink::Pending(_)) {
            return;
        }
        if let Sink::Pending(decide) = mem::replace(&mut self.sink, Sink::Resolved(None)) {
            self.sink = Sink::Resolved(decide().await);
        }
    }

    async fn forward(&mut self, frame: io::Result<Bytes>) {
        let Some(client) = &self.client else {
            return;
        };
        if client.send(frame).await.is_err() {
            debug!("client went away, continuing cache write");
            self.client = None;
        }
    }

    /// Whether the first chunk has been seen.
    pub fn is_resolved(&self) -> bool {
        matches!(self.sink, Sink::Resolved(_))
    }

    /// Whether chunks are being teed into a cache file.
    pub fn is_caching(&self) -> bool {
        matches!(self.sink, Sink::Resolved(Some(_)))
    }

    /// Splits into the cache file (if one was opened) and the client sink
    /// (if the client is still there).
    pub fn into_parts(self) -> (Option<CacheFile>, Option<ClientSink>) {
        let file = match self.sink {
            Sink::Resolved(file) => file,
            Sink::Pending(_) => None,
        };
        (file, self.client)
    }
}
