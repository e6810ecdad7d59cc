//! Media collaborators.
//!
//! # Data Flow
//! ```text
//! RequestContext (captures, query, body)
//!     → handlers.rs (one async fn per endpoint)
//!     → store.rs (MediaStore: put / get)
//!     → HandlerResult returned to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Handlers never write to the response; they return a result value
//! - No media processing: bytes are stored and served verbatim
//! - Identicon drawing is pluggable; without a generator the endpoint is 404

pub mod handlers;
pub mod store;

use std::sync::Arc;

use axum::body::Bytes;

pub use store::{DiskStore, MediaStore, StoreError, StoredMedia};

/// Produces identicon images for a seed.
pub trait IdenticonGenerator: Send + Sync {
    /// PNG bytes of a `width` x `height` image.
    fn generate(&self, seed: &str, width: u32, height: u32) -> Bytes;
}

/// Shared collaborators handed to every request context.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn MediaStore>,
    pub identicons: Option<Arc<dyn IdenticonGenerator>>,
}

impl Services {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self {
            store,
            identicons: None,
        }
    }

    pub fn with_identicons(mut self, generator: Arc<dyn IdenticonGenerator>) -> Self {
        self.identicons = Some(generator);
        self
    }
}
