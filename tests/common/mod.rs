//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request};
use axum::response::Response;
use media_gateway::config::{GatewayConfig, HomeserverConfig};
use media_gateway::http::{BoxedHandler, Handler, HandlerResult, RequestContext};
use media_gateway::media::{DiskStore, Services};
use media_gateway::routing::MediaHandlers;
use media_gateway::GatewayServer;
use tempfile::TempDir;

pub const HOST: &str = "example.org";
pub const VERSIONS: [&str; 2] = ["r0", "v1"];

/// Config serving `example.org` with media stored under `dir`.
pub fn config(dir: &TempDir) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.homeservers = vec![HomeserverConfig { name: HOST.to_string() }];
    config.uploads.storage_path = dir.path().join("media").to_string_lossy().into_owned();
    config
}

pub async fn store(config: &GatewayConfig) -> DiskStore {
    DiskStore::open(&config.uploads.storage_path).await.unwrap()
}

/// A handler that counts its calls and answers `{"handler": name}`.
pub fn counting(name: &'static str, calls: Arc<AtomicUsize>) -> BoxedHandler {
    (move |_ctx: RequestContext| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            HandlerResult::raw(serde_json::json!({ "handler": name }))
        }
    })
    .into_boxed_handler()
}

pub fn counting_handlers(calls: Arc<AtomicUsize>) -> MediaHandlers {
    MediaHandlers {
        upload: counting("upload", calls.clone()),
        download: counting("download", calls.clone()),
        thumbnail: counting("thumbnail", calls.clone()),
        preview_url: counting("preview_url", calls.clone()),
        identicon: counting("identicon", calls),
    }
}

/// A gateway whose handlers only count invocations.
pub async fn counting_gateway(config: GatewayConfig) -> (GatewayServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let services = Services::new(Arc::new(store(&config).await));
    let server = GatewayServer::with_handlers(config, services, counting_handlers(calls.clone())).unwrap();
    (server, calls)
}

pub fn request(method: Method, host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Every registered route of one version, with the handler that serves it.
pub fn routes(version: &str) -> Vec<(Method, String, &'static str)> {
    let base = format!("/_matrix/media/{version}");
    vec![
        (Method::POST, format!("{base}/upload"), "upload"),
        (Method::GET, format!("{base}/download/{HOST}/abc123"), "download"),
        (Method::GET, format!("{base}/download/{HOST}/abc123/cat.png"), "download"),
        (Method::GET, format!("{base}/thumbnail/{HOST}/abc123"), "thumbnail"),
        (Method::GET, format!("{base}/preview_url"), "preview_url"),
        (Method::GET, format!("{base}/identicon/some-seed"), "identicon"),
        (Method::GET, format!("{base}/identicon/"), "identicon"),
    ]
}
