//! Ingestion pipeline: extractor -> chunker -> embedder -> corpus index
//!
//! Each run is terminal: it ends in `ready` or `failed`, observable on the
//! document record. Failures are never retried automatically; a caller may
//! re-submit after observing `failed`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{ChunkingConfig, EmbeddingConfig, ProcessingConfig};
use crate::error::{Error, Result};
use crate::extraction::TextExtractor;
use crate::index::CorpusIndex;
use crate::providers::EmbeddingProvider;
use crate::storage::RecordStore;
use crate::types::{Chunk, DocumentFormat};

use super::chunker::PassageChunker;

pub struct IngestionPipeline {
    store: Arc<dyn RecordStore>,
    index: Arc<CorpusIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    extract_timeout: Duration,
    embed_timeout: Duration,
    parallel_embeddings: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<CorpusIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        embeddings: &EmbeddingConfig,
        processing: &ProcessingConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            chunking,
            extract_timeout: Duration::from_secs(processing.extract_timeout_secs),
            embed_timeout: Duration::from_secs(embeddings.timeout_secs),
            parallel_embeddings: processing.effective_parallel_embeddings(),
        }
    }

    /// Run one ingestion to a terminal state. The caller has already
    /// claimed the document's processing gate via
    /// `RecordStore::begin_processing`, which is what rejects a second
    /// concurrent run for the same document.
    ///
    /// Processing failures are recorded as `status = failed` and reported
    /// as `Ok`; `Err` means the terminal status itself could not be
    /// written.
    pub async fn run_claimed(
        &self,
        event_id: Uuid,
        document_id: Uuid,
        data: Bytes,
        filename: &str,
    ) -> Result<()> {
        tracing::info!(%event_id, %document_id, filename, "ingestion started");

        match self.process(event_id, document_id, data, filename).await {
            Ok(chunk_count) => {
                self.store
                    .mark_ready(document_id, chunk_count, Utc::now())
                    .await?;
                tracing::info!(%document_id, chunk_count, "ingestion complete");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.store.mark_failed(document_id, &reason).await?;
                // chunks persisted before the failure stay in the store for
                // the retry to overwrite, but a partial document must not
                // serve query context
                self.index.remove_above(event_id, document_id, 0);
                tracing::error!(%document_id, filename, error = %reason, "ingestion failed");
                Ok(())
            }
        }
    }

    async fn process(
        &self,
        event_id: Uuid,
        document_id: Uuid,
        data: Bytes,
        filename: &str,
    ) -> Result<u32> {
        let format = DocumentFormat::from_filename(filename)?;
        let text = self.extract(data, format).await?;

        let chunker = PassageChunker::from_config(&self.chunking)?;
        let passages = chunker.chunk(&text);
        if passages.is_empty() {
            // processed-but-empty document; drop any chunks a previous,
            // longer run left behind
            self.prune_tail(event_id, document_id, 0).await?;
            return Ok(0);
        }

        let encoder_version = self.embedder.version().to_string();
        let mut sequence = 0u32;
        for batch in passages.chunks(self.parallel_embeddings) {
            let embeddings =
                join_all(batch.iter().map(|p| self.embed_passage(p.text))).await;
            for (passage, embedding) in batch.iter().zip(embeddings) {
                // the first failure aborts the run; chunks persisted so far
                // stay, and a retry overwrites them by sequence key
                let embedding = embedding?;
                let chunk = Chunk::new(
                    document_id,
                    event_id,
                    sequence,
                    passage.text.to_string(),
                    passage.token_count as u32,
                    embedding,
                    encoder_version.clone(),
                );
                // upsert by (document_id, sequence): a retry after a partial
                // failure overwrites instead of appending
                self.store.upsert_chunk(&chunk).await?;
                self.index.upsert(chunk)?;
                sequence += 1;
            }
        }

        let chunk_count = passages.len() as u32;
        self.prune_tail(event_id, document_id, chunk_count).await?;
        Ok(chunk_count)
    }

    /// Extraction is CPU-bound and can stall on pathological inputs, so it
    /// runs on the blocking pool under a time bound.
    async fn extract(&self, data: Bytes, format: DocumentFormat) -> Result<String> {
        let handle =
            tokio::task::spawn_blocking(move || TextExtractor::extract(&data, format));
        match timeout(self.extract_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "extraction task failed: {}",
                join_error
            ))),
            Err(_) => Err(Error::Timeout(self.extract_timeout.as_secs())),
        }
    }

    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        match timeout(self.embed_timeout, self.embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.embed_timeout.as_secs())),
        }
    }

    /// A shorter re-ingestion would otherwise leave stale high-sequence
    /// chunks from a previous run, breaking `chunk_count == stored chunks`.
    async fn prune_tail(&self, event_id: Uuid, document_id: Uuid, from: u32) -> Result<()> {
        let removed = self.store.delete_chunks_from(document_id, from).await?;
        let dropped = self.index.remove_above(event_id, document_id, from);
        if removed > 0 || dropped > 0 {
            tracing::debug!(%document_id, removed, dropped, "pruned stale chunk tail");
        }
        Ok(())
    }
}
