//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, optional rate limit, tracing layer)
//!     → dispatch.rs (normalize, log, authorize, look up, invoke)
//!         → request.rs (correlation id, RequestContext)
//!         → handler.rs (type-erased handler call)
//!     → encoder.rs (HandlerResult → status, headers, body)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod encoder;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::RequestDispatcher;
pub use encoder::{encode_result, GENERIC_ERROR_JSON};
pub use handler::{BoxedHandler, Handler};
pub use request::{CancelSignal, RequestContext, RequestCounter, RequestId};
pub use response::{ApiError, ByteSource, ErrorCode, GeneratedImage, HandlerResult, MediaStream};
pub use server::GatewayServer;
