//! Text-generation provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Constrained answer generation over retrieved context.
///
/// The answer engine never asserts a match exists beyond "most similar
/// passages in context"; failures here degrade to declining to answer.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate an answer to `question` grounded in `context`
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// The model being used
    fn model(&self) -> &str;
}
