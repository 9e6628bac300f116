//! Ollama-backed providers for embeddings and answer generation
//!
//! A single `OllamaClient` is shared by both provider implementations so
//! they reuse one connection pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::generation::GenerationProvider;

/// Thin HTTP client for the Ollama API
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingsRequest { model, prompt: text })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let body: EmbeddingsResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(Error::Embedding(format!("model '{}' returned no vector", model)));
        }
        Ok(body.embedding)
    }

    pub async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature },
            })
            .send()
            .await
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;
        Ok(body.response.trim().to_string())
    }

    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

/// Ollama embedding provider (nomic-embed-text or similar)
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn from_client(client: Arc<OllamaClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.client.embed(&self.model, text).await?;
        if vector.len() != self.dimensions {
            return Err(Error::Embedding(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimensions
            )));
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn version(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama generation provider
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn from_client(client: Arc<OllamaClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let prompt = crate::answer::PromptBuilder::build_prompt(question, context);
        self.client
            .generate(&self.model, &prompt, self.temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Combined provider sharing one client for embeddings and generation
pub struct OllamaProvider;

impl OllamaProvider {
    pub fn connect(
        llm: &LlmConfig,
        embeddings: &EmbeddingConfig,
    ) -> Result<(OllamaEmbedder, OllamaGenerator)> {
        let client = Arc::new(OllamaClient::new(
            &llm.base_url,
            Duration::from_secs(llm.timeout_secs.max(embeddings.timeout_secs)),
        )?);
        Ok((
            OllamaEmbedder::from_client(Arc::clone(&client), embeddings),
            OllamaGenerator::from_client(client, llm),
        ))
    }
}
