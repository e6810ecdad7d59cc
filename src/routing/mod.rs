//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (radix lookup over registered paths)
//!     → pattern.rs (validate captures against their kind)
//!     → Return: Found / Preflight / MethodNotAllowed / NotFound
//!
//! Route Compilation (at startup):
//!     api.rs replicates the media API under every version prefix
//!     → pattern.rs parses each pattern (malformed = startup error)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex: fixed capture kinds with known character classes
//! - Deterministic: same input always matches same route

pub mod api;
pub mod pattern;
pub mod router;

use axum::http::Method;
use thiserror::Error;

pub use api::{media_routes, MediaHandlers};
pub use pattern::{CaptureKind, Captures, RoutePattern};
pub use router::{Lookup, RouteTable, RouteTableBuilder};

/// Errors raised while building a route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed route pattern `{pattern}`: {reason}")]
    Malformed { pattern: String, reason: String },
    #[error("route `{method} {pattern}` registered twice")]
    Duplicate { method: Method, pattern: String },
    #[error("route `{pattern}` conflicts with an existing route: {reason}")]
    Conflict { pattern: String, reason: String },
    #[error("OPTIONS is answered for every route and cannot be registered on `{0}`")]
    ReservedMethod(String),
}
