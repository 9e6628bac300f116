//! Answer engine: retrieval, confidence gating, grounded generation
//!
//! Runs when a ticket is created. Declines rather than guesses: an empty
//! index, a best match under the confidence threshold, or any provider
//! failure all yield "no automatic answer", leaving the ticket open for a
//! human.

mod prompt;

pub use prompt::{ContextPassage, PromptBuilder};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{EmbeddingConfig, LlmConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::index::{CorpusIndex, ScoredChunk};
use crate::providers::{EmbeddingProvider, GenerationProvider};
use crate::storage::RecordStore;

/// What the engine decided for one question
#[derive(Debug, Clone, Default)]
pub struct AnswerOutcome {
    pub auto_answer: Option<String>,
    /// Similarity of the best retrieved passage backing the answer
    pub score: Option<f32>,
}

impl AnswerOutcome {
    fn declined() -> Self {
        Self::default()
    }

    pub fn is_answered(&self) -> bool {
        self.auto_answer.is_some()
    }
}

pub struct AnswerEngine {
    store: Arc<dyn RecordStore>,
    index: Arc<CorpusIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    retrieval: RetrievalConfig,
    embed_timeout: Duration,
    generate_timeout: Duration,
}

impl AnswerEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<CorpusIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        retrieval: RetrievalConfig,
        embeddings: &EmbeddingConfig,
        llm: &LlmConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            generator,
            retrieval,
            embed_timeout: Duration::from_secs(embeddings.timeout_secs),
            generate_timeout: Duration::from_secs(llm.timeout_secs),
        }
    }

    /// Decide an automatic answer for `question` within one event's corpus.
    ///
    /// Never errors: every failure path degrades to declining, so ticket
    /// creation cannot fail because auto-answering failed. A declined
    /// outcome carries no score, making a provider failure indistinguishable
    /// from "no confident match".
    pub async fn answer(&self, event_id: Uuid, question: &str) -> AnswerOutcome {
        match self.try_answer(event_id, question).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(%event_id, error = %e, "auto-answer degraded to decline");
                AnswerOutcome::declined()
            }
        }
    }

    async fn try_answer(&self, event_id: Uuid, question: &str) -> Result<AnswerOutcome> {
        let query = match timeout(self.embed_timeout, self.embedder.embed(question)).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout(self.embed_timeout.as_secs())),
        };

        let hits = self.index.search(
            event_id,
            &query,
            self.embedder.version(),
            self.retrieval.top_k,
        )?;
        let Some(best) = hits.first() else {
            tracing::debug!(%event_id, "no indexed passages, declining");
            return Ok(AnswerOutcome::declined());
        };
        if best.score < self.retrieval.min_confidence {
            tracing::debug!(
                %event_id,
                best_score = best.score,
                threshold = self.retrieval.min_confidence,
                "best match under confidence threshold, declining"
            );
            return Ok(AnswerOutcome::declined());
        }
        let best_score = best.score;

        let context = self.build_context(&hits).await?;
        let answer =
            match timeout(self.generate_timeout, self.generator.generate(question, &context))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::GenerationUnavailable(format!(
                        "timed out after {}s",
                        self.generate_timeout.as_secs()
                    )))
                }
            };
        if answer.is_empty() {
            return Err(Error::GenerationUnavailable("empty response".into()));
        }

        tracing::info!(%event_id, score = best_score, "question answered from corpus");
        Ok(AnswerOutcome {
            auto_answer: Some(answer),
            score: Some(best_score),
        })
    }

    /// Passages in descending score order, labeled with their source
    /// filename, cut off at the context token budget. The best match is
    /// always included, even when it alone exceeds the budget.
    async fn build_context(&self, hits: &[ScoredChunk]) -> Result<String> {
        let mut budget = self.retrieval.max_context_tokens;
        let mut selected: Vec<&ScoredChunk> = Vec::new();
        for hit in hits {
            let tokens = hit.chunk.token_estimate as usize;
            if !selected.is_empty() && tokens > budget {
                break;
            }
            budget = budget.saturating_sub(tokens);
            selected.push(hit);
        }

        let mut filenames: HashMap<Uuid, String> = HashMap::new();
        for hit in &selected {
            let document_id = hit.chunk.document_id;
            if filenames.contains_key(&document_id) {
                continue;
            }
            let name = self
                .store
                .get_document(document_id)
                .await?
                .map(|d| d.filename)
                .unwrap_or_else(|| "unknown source".to_string());
            filenames.insert(document_id, name);
        }

        let passages: Vec<ContextPassage<'_>> = selected
            .iter()
            .map(|hit| ContextPassage {
                filename: filenames
                    .get(&hit.chunk.document_id)
                    .map(String::as_str)
                    .unwrap_or("unknown source"),
                text: &hit.chunk.text,
            })
            .collect();
        Ok(PromptBuilder::build_context(&passages))
    }
}
