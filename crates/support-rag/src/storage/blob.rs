//! Blob storage for raw uploaded files

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::document::hash_content;

/// Object storage exposed to the core as `put(bytes) -> url`
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store raw bytes, returning a storage URL
    async fn put(&self, filename: &str, data: &[u8]) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Filesystem-backed blob store
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, filename: &str, data: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;
        // content-hash prefix keeps re-uploads of the same name from
        // clobbering each other
        let prefix = &hash_content(data)[..12];
        let safe_name: String = filename
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let path = self.root.join(format!("{}_{}", prefix, safe_name));
        tokio::fs::write(&path, data).await?;
        Ok(format!("file://{}", path.display()))
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}
