//! Per-client token bucket rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::encoder::generic_error_response;
use crate::http::request::client_address;
use crate::http::response::ErrorBody;
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;

pub const LIMIT_EXCEEDED_CODE: &str = "M_LIMIT_EXCEEDED";
pub const LIMIT_EXCEEDED_MESSAGE: &str = "You are doing that too often";

/// Upper bound on how often idle buckets are swept.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets keyed by client address.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    rate: f64,
    burst: f64,
    ttl: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rate: config.requests_per_second,
            burst: f64::from(config.burst_count),
            ttl: Duration::from_secs(config.bucket_ttl_secs),
        }
    }

    /// Consume one token for `key`. Returns false if the client is over its limit.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, now));
        bucket.try_acquire(self.burst, self.rate, now)
    }

    /// Drop buckets untouched for longer than the TTL. Returns how many went.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < self.ttl);
        before - self.buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Periodically evict idle buckets until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: ShutdownListener) {
        let period = self.ttl.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
        let mut ticker = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(Instant::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.tracked_clients(), "Evicted idle rate limit buckets");
                    }
                }
                _ = shutdown.wait() => {
                    tracing::debug!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// The canonical rejection.
pub fn rate_limited_response() -> Response {
    let body = ErrorBody {
        code: LIMIT_EXCEEDED_CODE,
        message: LIMIT_EXCEEDED_MESSAGE,
    };
    let Ok(json) = serde_json::to_vec(&body) else {
        return generic_error_response();
    };

    let mut response = Response::new(Body::from(json));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_address(request.headers(), peer);

    if limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        rate_limited_response()
    }
}
