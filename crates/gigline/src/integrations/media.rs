use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Stored file reference: a stable URL plus the handle needed to delete it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub url: String,
    pub handle: String,
}

/// File received from a client, ready to hand to a media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn is_image(&self) -> bool {
        match self.content_type.as_deref() {
            Some(mime) => mime.starts_with("image/"),
            None => true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media backend failed: {0}")]
    Backend(String),
    #[error("media rejected: {0}")]
    Rejected(String),
}

/// Outbound media host used for job images and identity documents.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: MediaUpload, folder: &str) -> Result<MediaAsset, MediaError>;
    async fn delete(&self, handle: &str) -> Result<(), MediaError>;
}
