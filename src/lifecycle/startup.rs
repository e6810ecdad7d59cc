//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the media store
//! - Build the server and bind its listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig};
use crate::http::GatewayServer;
use crate::media::{DiskStore, Services, StoreError};
use crate::routing::RouteError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open media store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build routes: {0}")]
    Routes(#[from] RouteError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Open storage and build the server. Nothing is listening yet.
pub async fn prepare(config: GatewayConfig) -> Result<GatewayServer, StartupError> {
    let store = DiskStore::open(&config.uploads.storage_path).await?;
    tracing::info!(root = %store.root().display(), "Media store ready");

    let server = GatewayServer::new(config, Services::new(Arc::new(store)))?;
    Ok(server)
}

pub async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}
