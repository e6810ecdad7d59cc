//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the route table for every configured version
//! - Create the Axum router: dispatcher fallback, optional rate limit, tracing
//! - Bind server to listener and drain on shutdown
//! - Run the idle bucket sweeper alongside the server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::dispatch::{dispatch_handler, RequestDispatcher};
use crate::http::request::RequestCounter;
use crate::lifecycle::ShutdownListener;
use crate::media::Services;
use crate::routing::{media_routes, MediaHandlers, RouteError};
use crate::security::{rate_limit_middleware, RateLimiter};

/// HTTP server for the media gateway.
pub struct GatewayServer {
    router: Router,
    counter: Arc<RequestCounter>,
    limiter: Option<Arc<RateLimiter>>,
}

impl GatewayServer {
    /// Create a server with the built-in media handlers.
    pub fn new(config: GatewayConfig, services: Services) -> Result<Self, RouteError> {
        Self::with_handlers(config, services, MediaHandlers::default())
    }

    /// Create a server with a custom handler set.
    pub fn with_handlers(
        config: GatewayConfig,
        services: Services,
        handlers: MediaHandlers,
    ) -> Result<Self, RouteError> {
        let routes = media_routes(&config.general.api_prefix, &config.general.versions, &handlers)?;
        for (method, pattern) in routes.routes() {
            tracing::debug!(method = %method, route = %pattern, "Route active");
        }
        tracing::info!(routes = routes.len(), versions = ?config.general.versions, "Route table built");

        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        let counter = Arc::new(RequestCounter::new());
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::new(routes),
            counter.clone(),
            Arc::new(config),
            services,
        ));

        let router = Self::build_router(dispatcher, limiter.clone());
        Ok(Self {
            router,
            counter,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Arc<RequestDispatcher>, limiter: Option<Arc<RateLimiter>>) -> Router {
        let mut router = Router::new().fallback(dispatch_handler).with_state(dispatcher);

        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router.layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn counter(&self) -> Arc<RequestCounter> {
        self.counter.clone()
    }

    pub fn limiter(&self) -> Option<Arc<RateLimiter>> {
        self.limiter.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = self.limiter.clone() {
            tokio::spawn(limiter.run_sweeper(shutdown.fork()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
