//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the media gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and API surface settings.
    pub general: GeneralConfig,

    /// Domains this gateway serves media for (the ownership gate).
    pub homeservers: Vec<HomeserverConfig>,

    /// Upload limits and storage location.
    pub uploads: UploadsConfig,

    /// Thumbnail request limits.
    pub thumbnails: ThumbnailsConfig,

    /// URL preview settings.
    pub url_previews: UrlPreviewsConfig,

    /// Identicon settings.
    pub identicons: IdenticonsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            homeservers: vec![HomeserverConfig {
                name: "localhost".to_string(),
            }],
            uploads: UploadsConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            url_previews: UrlPreviewsConfig::default(),
            identicons: IdenticonsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Socket address string the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.general.bind_address, self.general.port)
    }
}

/// General settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Bind address (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listen port.
    pub port: u16,

    /// Path prefix every API route lives under.
    pub api_prefix: String,

    /// Value of the `Server` response header.
    pub server_name: String,

    /// Protocol versions the API is replicated under.
    pub versions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/_matrix/media".to_string(),
            server_name: "media-gateway".to_string(),
            versions: vec!["r0".to_string(), "v1".to_string()],
        }
    }
}

/// A served domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HomeserverConfig {
    /// Domain name as it appears in the Host header (no port).
    pub name: String,
}

/// Upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Largest accepted upload in bytes.
    pub max_bytes: u64,

    /// Directory the disk store keeps media under.
    pub storage_path: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024, // 100MB
            storage_path: "./media".to_string(),
        }
    }
}

/// Thumbnail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThumbnailsConfig {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UrlPreviewsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdenticonsConfig {
    pub enabled: bool,
}

impl Default for IdenticonsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_count: u32,

    /// Seconds of inactivity after which a client's bucket is dropped.
    pub bucket_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 1.0,
            burst_count: 10,
            bucket_ttl_secs: 3600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "media_gateway=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
