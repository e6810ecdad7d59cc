//! Media storage.
//!
//! Items live at `<root>/<origin>/<media_id>` with a `<media_id>.json`
//! sidecar holding the metadata.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MEDIA_ID_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt media record: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// Metadata of one stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub origin: String,
    pub media_id: String,
    pub content_type: String,
    pub filename: String,
    pub size_bytes: u64,
    /// Where the bytes are; filled in on read, not persisted.
    #[serde(skip)]
    pub location: PathBuf,
}

/// Storage handle consumed by handlers.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(
        &self,
        origin: &str,
        content_type: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<StoredMedia, StoreError>;

    async fn get(&self, origin: &str, media_id: &str) -> Result<Option<StoredMedia>, StoreError>;
}

/// Filesystem-backed [`MediaStore`].
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(path = ?root, "Media store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_dir(&self, origin: &str) -> Result<PathBuf, StoreError> {
        check_key(origin)?;
        Ok(self.root.join(origin))
    }
}

/// Keys become path components; refuse anything that could escape the root.
fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn generate_media_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MEDIA_ID_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl MediaStore for DiskStore {
    async fn put(
        &self,
        origin: &str,
        content_type: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<StoredMedia, StoreError> {
        let dir = self.item_dir(origin)?;
        tokio::fs::create_dir_all(&dir).await?;

        let media_id = generate_media_id();
        let location = dir.join(&media_id);
        tokio::fs::write(&location, &bytes).await?;

        let media = StoredMedia {
            origin: origin.to_string(),
            media_id: media_id.clone(),
            content_type: content_type.to_string(),
            filename: filename.to_string(),
            size_bytes: bytes.len() as u64,
            location,
        };
        let record = serde_json::to_vec_pretty(&media)?;
        tokio::fs::write(dir.join(format!("{media_id}.json")), record).await?;

        Ok(media)
    }

    async fn get(&self, origin: &str, media_id: &str) -> Result<Option<StoredMedia>, StoreError> {
        let dir = self.item_dir(origin)?;
        check_key(media_id)?;

        let record = match tokio::fs::read(dir.join(format!("{media_id}.json"))).await {
            Ok(record) => record,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut media: StoredMedia = serde_json::from_slice(&record)?;
        media.location = dir.join(media_id);
        Ok(Some(media))
    }
}
