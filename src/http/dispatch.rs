//! Request dispatch.
//!
//! # Flow
//! ```text
//! Received → Normalized → Authorized | Rejected → (Invoked →) Encoded → Responded
//! ```
//!
//! # Design Decisions
//! - One linear pass per request; no retries, no timeout
//! - No lock is held while a handler runs
//! - Base headers are applied last, so every outcome carries them
//! - The correlation id counter is injected, never global

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Request};
use axum::response::Response;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::http::encoder::encode_result;
use crate::http::request::{
    client_address, log_safe_query, normalize_host, CancelGuard, RequestContext, RequestCounter, RequestParts,
};
use crate::http::response::{ApiError, HandlerResult};
use crate::media::Services;
use crate::observability::metrics;
use crate::routing::{Lookup, RouteTable};
use crate::security::{is_server_ours, BaseHeaders};

/// Turns one request into one response.
pub struct RequestDispatcher {
    routes: Arc<RouteTable>,
    counter: Arc<RequestCounter>,
    config: Arc<GatewayConfig>,
    services: Services,
    headers: BaseHeaders,
}

impl RequestDispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        counter: Arc<RequestCounter>,
        config: Arc<GatewayConfig>,
        services: Services,
    ) -> Self {
        let headers = BaseHeaders::new(&config.general.server_name);
        Self {
            routes,
            counter,
            config,
            services,
            headers,
        }
    }

    pub fn counter(&self) -> &Arc<RequestCounter> {
        &self.counter
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let host = normalize_host(&parts.headers, &parts.uri);
        let remote_addr = client_address(&parts.headers, peer);
        let path = parts.uri.path().to_string();
        let method = parts.method;
        let request_id = self.counter.next_id();

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            host = %host,
            resource = %path,
            remote_addr = %remote_addr,
        );

        {
            let _entered = span.enter();
            let header_str = |name: header::HeaderName| {
                parts
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
            };
            tracing::info!(
                content_type = header_str(header::CONTENT_TYPE),
                content_length = header_str(header::CONTENT_LENGTH),
                query = %log_safe_query(parts.uri.query()),
                "Received request"
            );
        }

        // Fires if this future is dropped before a response is built.
        let (guard, cancel) = CancelGuard::pair();

        let result = if !is_server_ours(&host, &self.config) {
            span.in_scope(|| tracing::warn!("Host is not served here, rejecting"));
            HandlerResult::from(ApiError::auth_failed())
        } else {
            match self.routes.lookup(&method, &path) {
                Lookup::Found { handler, captures } => {
                    let ctx = RequestContext::new(
                        RequestParts {
                            request_id,
                            method: method.clone(),
                            path,
                            host,
                            remote_addr,
                            captures,
                            query: parts.uri.query().map(str::to_string),
                            headers: parts.headers,
                        },
                        body,
                        self.config.clone(),
                        self.services.clone(),
                        span.clone(),
                        cancel,
                    );
                    handler.call(ctx).instrument(span.clone()).await
                }
                Lookup::Preflight => HandlerResult::Empty,
                Lookup::MethodNotAllowed => ApiError::method_not_allowed().into(),
                Lookup::NotFound => ApiError::not_found("Not found").into(),
            }
        };

        let kind = result.kind();
        let mut response = encode_result(result).instrument(span.clone()).await;
        self.headers.apply(response.headers_mut());
        guard.disarm();

        metrics::record_request(method.as_str(), response.status().as_u16(), kind, start);
        response
    }
}

/// Axum fallback: every request goes through the dispatcher.
pub async fn dispatch_handler(State(dispatcher): State<Arc<RequestDispatcher>>, request: Request<Body>) -> Response {
    dispatcher.dispatch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HomeserverConfig;
    use crate::media::DiskStore;
    use axum::http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn dispatcher(calls: Arc<AtomicUsize>, dir: &std::path::Path) -> RequestDispatcher {
        let mut config = GatewayConfig::default();
        config.homeservers = vec![HomeserverConfig { name: "example.org".into() }];

        let handler = move |ctx: RequestContext| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                HandlerResult::raw(serde_json::json!({ "id": ctx.capture("id") }))
            }
        };
        let routes = RouteTable::builder()
            .route(Method::GET, "/things/{id:media_id}", handler)
            .unwrap()
            .build();

        let store = DiskStore::open(dir).await.unwrap();
        RequestDispatcher::new(
            Arc::new(routes),
            Arc::new(RequestCounter::new()),
            Arc::new(config),
            Services::new(Arc::new(store)),
        )
    }

    fn request(method: Method, host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_found_invokes_handler_with_captures() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone(), dir.path()).await;

        let response = dispatcher
            .dispatch(request(Method::GET, "example.org:8008", "/things/abc123"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body_string(response).await, r#"{"id":"abc123"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.counter().issued(), 1);
    }

    #[tokio::test]
    async fn test_foreign_host_never_reaches_handler() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone(), dir.path()).await;

        let response = dispatcher
            .dispatch(request(Method::GET, "evil.example", "/things/abc123"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::SERVER], "media-gateway");
        assert_eq!(
            body_string(response).await,
            r#"{"code":"M_UNKNOWN_TOKEN","message":"Authentication Failed"}"#
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(calls.clone(), dir.path()).await;

        let response = dispatcher
            .dispatch(request(Method::OPTIONS, "example.org", "/things/abc123"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "{}");

        let response = dispatcher
            .dispatch(request(Method::POST, "example.org", "/things/abc123"))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = dispatcher.dispatch(request(Method::GET, "example.org", "/nowhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CACHE_CONTROL], crate::security::headers::CACHE_CONTROL);

        // Capture class violation is an unmatched path.
        let response = dispatcher
            .dispatch(request(Method::GET, "example.org", "/things/not-alnum"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.counter().issued(), 4);
    }
}
