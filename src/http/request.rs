//! Request handling and normalization.
//!
//! # Responsibilities
//! - Issue correlation ids (`REQ-<n>`) from an explicit shared counter
//! - Normalize host and client address
//! - Produce a log-safe query string
//! - Carry everything a handler may use in [`RequestContext`]
//!
//! # Design Decisions
//! - Counter is passed in at construction, never a global
//! - `X-Forwarded-For` is trusted verbatim; any client can spoof it
//! - The context is owned by one request and dropped with it

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Uri};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::Span;

use crate::config::GatewayConfig;
use crate::media::{MediaStore, Services};
use crate::routing::Captures;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Query parameters whose values never reach the logs.
const REDACTED_PARAMS: &[&str] = &["access_token"];

/// Correlation id of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REQ-{}", self.0)
    }
}

/// Monotonic request id source. Starts at zero on every process start.
#[derive(Debug, Default)]
pub struct RequestCounter {
    next: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Host header without any `:port` suffix.
pub fn normalize_host(headers: &HeaderMap, uri: &Uri) -> String {
    let raw = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default();
    raw.split(':').next().unwrap_or_default().to_string()
}

/// Client address: `X-Forwarded-For` if present, else the peer IP.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(forwarded), _) => forwarded.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Query string with sensitive values replaced by `redacted`.
pub fn log_safe_query(query: Option<&str>) -> String {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return String::new();
    };

    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if REDACTED_PARAMS.contains(&key.as_ref()) {
            out.append_pair(&key, "redacted");
        } else {
            out.append_pair(&key, &value);
        }
    }
    out.finish()
}

/// Fires when the request it belongs to is abandoned.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the request is cancelled. Never resolves for a request
    /// that completed normally.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Cancels the paired [`CancelSignal`] when dropped without [`disarm`](Self::disarm).
///
/// The dispatcher holds one per request; if the connection goes away the
/// dispatch future is dropped and the signal fires.
#[derive(Debug)]
pub struct CancelGuard {
    tx: Option<watch::Sender<bool>>,
}

impl CancelGuard {
    pub fn pair() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Some(tx) }, CancelSignal { rx })
    }

    /// The request finished; the signal will never fire.
    pub fn disarm(mut self) {
        self.tx.take();
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(true);
        }
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("request body already consumed")]
    Consumed,
    #[error("request cancelled while reading body")]
    Cancelled,
    #[error("failed to read request body: {0}")]
    Read(#[from] axum::Error),
}

/// Everything a handler gets to see about one request.
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub host: String,
    pub remote_addr: String,
    pub captures: Captures,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub config: Arc<GatewayConfig>,
    pub services: Services,
    /// Span carrying the correlation id; handler futures run inside it.
    pub span: Span,
    pub cancel: CancelSignal,
    // Body is !Sync; the lock is never contended.
    body: Mutex<Option<Body>>,
}

/// Request metadata the dispatcher assembles before invoking a handler.
pub struct RequestParts {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub host: String,
    pub remote_addr: String,
    pub captures: Captures,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(
        parts: RequestParts,
        body: Body,
        config: Arc<GatewayConfig>,
        services: Services,
        span: Span,
        cancel: CancelSignal,
    ) -> Self {
        let query = parts
            .query
            .as_deref()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            request_id: parts.request_id,
            method: parts.method,
            path: parts.path,
            host: parts.host,
            remote_addr: parts.remote_addr,
            captures: parts.captures,
            query,
            headers: parts.headers,
            config,
            services,
            span,
            cancel,
            body: Mutex::new(Some(body)),
        }
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
    }

    pub fn store(&self) -> &dyn MediaStore {
        self.services.store.as_ref()
    }

    /// Read the whole body, failing once more than `limit` bytes arrive.
    ///
    /// Gives up with [`BodyError::Cancelled`] as soon as the request is
    /// abandoned, even if the client is still trickling bytes.
    pub async fn read_body(&mut self, limit: usize) -> Result<Bytes, BodyError> {
        let body = match self.body.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let body = body.ok_or(BodyError::Consumed)?;

        let mut stream = body.into_data_stream();
        let mut buf = Vec::new();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(BodyError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if buf.len() + chunk.len() > limit {
                return Err(BodyError::TooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::collections::HashSet;

    #[test]
    fn test_request_ids_start_at_zero() {
        let counter = RequestCounter::new();
        assert_eq!(counter.next_id().to_string(), "REQ-0");
        assert_eq!(counter.next_id().to_string(), "REQ-1");
        assert_eq!(counter.issued(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ids_are_distinct_and_contiguous() {
        let counter = Arc::new(RequestCounter::new());
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let counter = counter.clone();
            tasks.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    ids.push(counter.next_id());
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for task in tasks {
            let ids = task.await.unwrap();
            // Issuance order within one task is strictly increasing.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            all.extend(ids);
        }

        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        all.sort();
        let values: Vec<u64> = all.iter().map(RequestId::value).collect();
        assert_eq!(values, (0..1600).collect::<Vec<_>>());
    }

    #[test]
    fn test_normalize_host_strips_port() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.org:8008"));
        let uri: Uri = "/path".parse().unwrap();
        assert_eq!(normalize_host(&headers, &uri), "example.org");

        let uri: Uri = "http://other.example:80/path".parse().unwrap();
        assert_eq!(normalize_host(&HeaderMap::new(), &uri), "other.example");
    }

    #[test]
    fn test_client_address_prefers_forwarded_header() {
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some(peer)), "10.0.0.1");
        assert_eq!(client_address(&headers, None), "unknown");

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_log_safe_query_redacts_token() {
        assert_eq!(
            log_safe_query(Some("access_token=secret&filename=cat.png")),
            "access_token=redacted&filename=cat.png"
        );
        assert_eq!(log_safe_query(None), "");
        assert_eq!(log_safe_query(Some("")), "");
    }

    #[tokio::test]
    async fn test_cancel_guard() {
        let (guard, signal) = CancelGuard::pair();
        assert!(!signal.is_cancelled());
        drop(guard);
        assert!(signal.is_cancelled());
        signal.cancelled().await;

        let (guard, signal) = CancelGuard::pair();
        guard.disarm();
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    async fn context(dir: &std::path::Path, body: Body, cancel: CancelSignal) -> RequestContext {
        let store = crate::media::DiskStore::open(dir).await.unwrap();
        RequestContext::new(
            RequestParts {
                request_id: RequestCounter::new().next_id(),
                method: Method::POST,
                path: "/upload".into(),
                host: "example.org".into(),
                remote_addr: "127.0.0.1".into(),
                captures: Captures::default(),
                query: Some("filename=a.txt".into()),
                headers: HeaderMap::new(),
            },
            body,
            Arc::new(GatewayConfig::default()),
            Services::new(Arc::new(store)),
            Span::none(),
            cancel,
        )
    }

    #[tokio::test]
    async fn test_read_body_collects_chunks_once() {
        let dir = tempfile::tempdir().unwrap();
        let (guard, cancel) = CancelGuard::pair();
        let mut ctx = context(dir.path(), Body::from("hello"), cancel).await;
        assert_eq!(ctx.query_param("filename"), Some("a.txt"));

        assert_eq!(&ctx.read_body(1024).await.unwrap()[..], b"hello");
        assert!(matches!(ctx.read_body(1024).await, Err(BodyError::Consumed)));
        guard.disarm();
    }

    #[tokio::test]
    async fn test_read_body_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (_guard, cancel) = CancelGuard::pair();
        let mut ctx = context(dir.path(), Body::from("0123456789"), cancel).await;
        assert!(matches!(
            ctx.read_body(4).await,
            Err(BodyError::TooLarge { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_read_body_stops_when_request_is_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let (guard, cancel) = CancelGuard::pair();
        // A client that never sends another byte.
        let stalled = futures_util::stream::pending::<Result<Bytes, std::io::Error>>();
        let mut ctx = context(dir.path(), Body::from_stream(stalled), cancel).await;

        let read = tokio::spawn(async move { ctx.read_body(1024).await });
        tokio::task::yield_now().await;
        drop(guard);

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), read)
            .await
            .expect("read_body kept waiting after cancellation")
            .unwrap();
        assert!(matches!(result, Err(BodyError::Cancelled)));
    }
}
