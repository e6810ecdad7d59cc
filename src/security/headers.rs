//! Response headers sent on every dispatched response.
//!
//! # Responsibilities
//! - CORS: wildcard origin, fixed header and method lists
//! - Restrictive Content-Security-Policy for served media
//! - Public caching and server identification
//!
//! # Design Decisions
//! - Built once at startup, copied onto each response
//! - Applied after encoding, so they are present on errors and rejections too

use axum::http::header::{self, HeaderMap, HeaderValue};

pub const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'none'; script-src 'none'; plugin-types application/pdf; style-src 'unsafe-inline'; object-src 'self'";
pub const CACHE_CONTROL: &str = "public,max-age=86400,s-maxage=86400";
pub const DEFAULT_SERVER_NAME: &str = "media-gateway";

/// The fixed header set.
#[derive(Debug, Clone)]
pub struct BaseHeaders {
    headers: HeaderMap,
}

impl BaseHeaders {
    pub fn new(server_name: &str) -> Self {
        let server = HeaderValue::from_str(server_name).unwrap_or_else(|_| {
            tracing::warn!(server_name, "Invalid server name, using default");
            HeaderValue::from_static(DEFAULT_SERVER_NAME)
        });

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(CONTENT_SECURITY_POLICY));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
        headers.insert(header::SERVER, server);
        Self { headers }
    }

    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}
