//! Handler trait and type erasure.
//!
//! Any `Fn(RequestContext) -> impl Future` whose output converts into a
//! [`HandlerResult`] is a handler. That covers plain `async fn`s returning
//! `HandlerResult`, `Result<T, ApiError>`, `Option<HandlerResult>` or `()`.
//!
//! ```text
//! async fn download(ctx: RequestContext) -> Result<MediaStream, ApiError>
//!        ↓ download.into_boxed_handler()
//! Arc::new(FnHandler(download))          stored as BoxedHandler
//!        ↓ handler.call(ctx) at request time
//! Box::pin(async { download(ctx).await.into() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::http::request::RequestContext;
use crate::http::response::HandlerResult;

/// A heap-allocated, type-erased future that resolves to a [`HandlerResult`].
pub type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler: Send + Sync {
    fn call(&self, ctx: RequestContext) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests and versions.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Implemented for every valid route handler.
pub trait Handler: Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerResult> + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerResult> + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into() })
    }
}
