//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket, optional)
//!     → dispatcher
//!         → headers.rs (CORS, CSP, cache, server headers on every response)
//!         → access_control.rs (host must be one of ours)
//! ```
//!
//! # Design Decisions
//! - Rate-limit rejection never reaches the dispatcher or a handler
//! - Ownership gate runs before any handler, including not-found answers
//! - Client key comes from `X-Forwarded-For` when present (spoofable)

pub mod access_control;
pub mod headers;
pub mod rate_limit;

pub use access_control::is_server_ours;
pub use headers::BaseHeaders;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
