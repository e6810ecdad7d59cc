//! Media repository gateway library.
//!
//! Dispatches the versioned media API onto handlers, gates requests by
//! served domain, and encodes typed handler results into HTTP responses.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{GatewayServer, HandlerResult, RequestContext, RequestDispatcher};
pub use lifecycle::Shutdown;
