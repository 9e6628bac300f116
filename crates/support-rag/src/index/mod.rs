//! Per-event corpus index with exact cosine nearest-neighbor search
//!
//! A logical view over chunks, partitioned by event: queries never cross
//! event boundaries, so no cross-event locking is needed. Reads concurrent
//! with an in-flight ingestion of another document simply do not see its
//! chunks yet.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1], higher is more similar
    pub score: f32,
}

struct IndexedChunk {
    chunk: Chunk,
    norm: f32,
}

#[derive(Default)]
struct EventIndex {
    /// Encoder version of every stored chunk; set on first insert
    encoder_version: Option<String>,
    chunks: Vec<IndexedChunk>,
}

/// In-memory index over all events' chunks
#[derive(Default)]
pub struct CorpusIndex {
    events: DashMap<Uuid, EventIndex>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk, replacing any existing entry with the same
    /// `(document_id, sequence)` key.
    pub fn upsert(&self, chunk: Chunk) -> Result<()> {
        let mut event = self.events.entry(chunk.event_id).or_default();

        match &event.encoder_version {
            Some(version) if *version != chunk.encoder_version => {
                return Err(Error::EncoderVersionMismatch {
                    indexed: version.clone(),
                    query: chunk.encoder_version,
                });
            }
            Some(_) => {}
            None => event.encoder_version = Some(chunk.encoder_version.clone()),
        }

        let norm = l2_norm(&chunk.embedding);
        let key = (chunk.document_id, chunk.sequence);
        let entry = IndexedChunk { chunk, norm };
        match event
            .chunks
            .iter_mut()
            .find(|c| (c.chunk.document_id, c.chunk.sequence) == key)
        {
            Some(slot) => *slot = entry,
            None => event.chunks.push(entry),
        }
        Ok(())
    }

    /// Drop chunks of `document_id` with `sequence >= from_sequence`.
    /// Returns how many were removed.
    pub fn remove_above(&self, event_id: Uuid, document_id: Uuid, from_sequence: u32) -> usize {
        let Some(mut event) = self.events.get_mut(&event_id) else {
            return 0;
        };
        let before = event.chunks.len();
        event
            .chunks
            .retain(|c| c.chunk.document_id != document_id || c.chunk.sequence < from_sequence);
        before - event.chunks.len()
    }

    /// Nearest-neighbor search within one event.
    ///
    /// Results are in descending score order, ties broken by ascending
    /// `(document_id, sequence)`. `k` is clamped to the available chunk
    /// count; an event with no chunks yields an empty list.
    pub fn search(
        &self,
        event_id: Uuid,
        query: &[f32],
        query_version: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let Some(event) = self.events.get(&event_id) else {
            return Ok(Vec::new());
        };
        if event.chunks.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(indexed) = &event.encoder_version {
            if indexed != query_version {
                return Err(Error::EncoderVersionMismatch {
                    indexed: indexed.clone(),
                    query: query_version.to_string(),
                });
            }
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<ScoredChunk> = Vec::with_capacity(event.chunks.len());
        for indexed in &event.chunks {
            if indexed.chunk.embedding.len() != query.len() {
                return Err(Error::Embedding(format!(
                    "dimension mismatch: index has {}, query has {}",
                    indexed.chunk.embedding.len(),
                    query.len()
                )));
            }
            scored.push(ScoredChunk {
                score: cosine(query, query_norm, &indexed.chunk.embedding, indexed.norm),
                chunk: indexed.chunk.clone(),
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| order_key(&a.chunk).cmp(&order_key(&b.chunk)))
        });
        scored.truncate(k.min(scored.len()));
        Ok(scored)
    }

    /// Chunks currently visible for an event
    pub fn chunk_count(&self, event_id: Uuid) -> usize {
        self.events.get(&event_id).map_or(0, |e| e.chunks.len())
    }
}

fn order_key(chunk: &Chunk) -> (Uuid, u32) {
    (chunk.document_id, chunk.sequence)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let score = dot / (a_norm * b_norm);
    score.clamp(-1.0, 1.0)
}
