//! Pluggable capability boundaries: embeddings, generation, storage backends

pub mod embedding;
pub mod generation;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use generation::GenerationProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator, OllamaProvider};
