//! Configuration for the support core

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Background processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,
}

impl SupportConfig {
    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural constraints: `overlap < window` and
    /// `min_confidence` in (0, 1). Everything else is policy.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.overlap_tokens >= self.chunking.window_tokens {
            return Err(Error::InvalidChunkConfig {
                window: self.chunking.window_tokens,
                overlap: self.chunking.overlap_tokens,
            });
        }
        if !(self.retrieval.min_confidence > 0.0 && self.retrieval.min_confidence < 1.0) {
            return Err(Error::Config(format!(
                "min_confidence must be in (0, 1), got {}",
                self.retrieval.min_confidence
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }
}

/// Passage windowing, in whitespace-token units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in tokens
    pub window_tokens: usize,
    /// Overlap between consecutive windows in tokens
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: 200,
            overlap_tokens: 40,
        }
    }
}

/// Retrieval and confidence gating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Minimum best-match cosine similarity before auto-answering
    pub min_confidence: f32,
    /// Token budget for the generation context window
    pub max_context_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_confidence: 0.35,
            max_context_tokens: 1200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model served by the embedding provider
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Timeout per embedding call in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            timeout_secs: 30,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "phi3".to_string(),
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Background ingestion worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Concurrent document ingestions (default: CPU count, max 8)
    pub parallel_documents: Option<usize>,
    /// Concurrent embedding calls within one document (default: CPU count, max 4)
    pub parallel_embeddings: Option<usize>,
    /// Queued jobs before submission starts failing fast
    pub queue_depth: usize,
    /// Timeout for text extraction of one document, in seconds
    pub extract_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            parallel_embeddings: None,
            queue_depth: 64,
            extract_timeout_secs: 60,
        }
    }
}

impl ProcessingConfig {
    pub fn effective_parallel_documents(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }

    pub fn effective_parallel_embeddings(&self) -> usize {
        self.parallel_embeddings
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path for the durable record store
    pub database_path: PathBuf,
    /// Directory for raw uploaded files
    pub blob_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/support.db"),
            blob_dir: PathBuf::from("data/uploads"),
        }
    }
}
