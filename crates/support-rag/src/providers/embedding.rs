//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a fixed-length vector whose cosine similarity approximates
/// semantic relatedness.
///
/// The same encoder version must be used for all chunks and queries within
/// one event; the corpus index enforces this with the `version` tag.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensions (e.g., 768 for nomic-embed-text)
    fn dimensions(&self) -> usize;

    /// Encoder version recorded on every chunk this provider embeds
    fn version(&self) -> &str;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
