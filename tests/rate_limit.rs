//! Rate limiting in front of the dispatcher.

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use media_gateway::config::HomeserverConfig;
use media_gateway::Shutdown;
use tokio::net::TcpListener;
use tower::ServiceExt;

mod common;

use common::{body_bytes, request, HOST};

const LIMITED_BODY: &[u8] = br#"{"code":"M_LIMIT_EXCEEDED","message":"You are doing that too often"}"#;

fn limited_config(dir: &tempfile::TempDir, burst: u32) -> media_gateway::GatewayConfig {
    let mut config = common::config(dir);
    config.rate_limit.enabled = true;
    // Refill is negligible over the length of a test.
    config.rate_limit.requests_per_second = 0.001;
    config.rate_limit.burst_count = burst;
    config
}

fn forwarded(client: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri("/_matrix/media/r0/preview_url")
        .header(header::HOST, HOST)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_rejection_never_reaches_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let (server, calls) = common::counting_gateway(limited_config(&dir, 3)).await;
    let router = server.router();

    for _ in 0..3 {
        let response = router.clone().oneshot(forwarded("203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(server.counter().issued(), 3);

    let response = router.clone().oneshot(forwarded("203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(&body_bytes(response).await[..], LIMITED_BODY);

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(server.counter().issued(), 3);
}

#[tokio::test]
async fn test_clients_have_separate_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let (server, calls) = common::counting_gateway(limited_config(&dir, 1)).await;
    let router = server.router();

    let response = router.clone().oneshot(forwarded("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router.clone().oneshot(forwarded("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = router.clone().oneshot(forwarded("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(server.limiter().unwrap().tracked_clients(), 2);
}

#[tokio::test]
async fn test_disabled_limiter_admits_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (server, calls) = common::counting_gateway(common::config(&dir)).await;
    assert!(server.limiter().is_none());

    let router = server.router();
    for _ in 0..20 {
        let response = router
            .clone()
            .oneshot(request(Method::GET, HOST, "/_matrix/media/r0/preview_url"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_limit_over_real_socket() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = limited_config(&dir, 2);
    config.homeservers.push(HomeserverConfig { name: "127.0.0.1".into() });
    let (server, calls) = common::counting_gateway(config).await;
    let counter = server.counter();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.listener()));

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/_matrix/media/v1/preview_url");

    for _ in 0..2 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["handler"], "preview_url");
    }

    // The peer address is the bucket key.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(&res.bytes().await.unwrap()[..], LIMITED_BODY);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(counter.issued(), 2);

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();
}
