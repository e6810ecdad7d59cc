//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and handlers produce:
//!     → logging.rs (structured events inside the per-request span)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Every request runs inside a span carrying its `REQ-<n>` id
//! - Metrics are cheap and optional (no recorder = no-op)

pub mod logging;
pub mod metrics;
