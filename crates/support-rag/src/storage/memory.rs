//! In-memory record store, the fake the tests inject

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, DocumentStatus, Ticket};

use super::RecordStore;

#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<Uuid, Document>,
    /// Keyed by `(document_id, sequence)`, which makes upsert the natural
    /// insert operation
    chunks: DashMap<(Uuid, u32), Chunk>,
    tickets: DashMap<Uuid, Ticket>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        self.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.get(&id).map(|d| d.clone()))
    }

    async fn documents_for_event(&self, event_id: Uuid) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| d.event_id == event_id)
            .map(|d| d.clone())
            .collect();
        docs.sort_by_key(|d| d.uploaded_at);
        Ok(docs)
    }

    async fn begin_processing(&self, document_id: Uuid) -> Result<Document> {
        // get_mut holds the shard lock, making the check-and-set atomic
        let mut entry = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
        if entry.status == DocumentStatus::Processing {
            return Err(Error::AlreadyInProgress(document_id));
        }
        entry.status = DocumentStatus::Processing;
        entry.failure_reason = None;
        Ok(entry.clone())
    }

    async fn mark_ready(
        &self,
        document_id: Uuid,
        chunk_count: u32,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entry = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
        entry.status = DocumentStatus::Ready;
        entry.chunk_count = chunk_count;
        entry.processed_at = Some(processed_at);
        entry.failure_reason = None;
        Ok(())
    }

    async fn mark_failed(&self, document_id: Uuid, reason: &str) -> Result<()> {
        let mut entry = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
        entry.status = DocumentStatus::Failed;
        entry.failure_reason = Some(reason.to_string());
        Ok(())
    }

    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.chunks
            .insert((chunk.document_id, chunk.sequence), chunk.clone());
        Ok(())
    }

    async fn delete_chunks_from(&self, document_id: Uuid, from_sequence: u32) -> Result<u32> {
        let stale: Vec<(Uuid, u32)> = self
            .chunks
            .iter()
            .filter(|entry| {
                let (doc, seq) = *entry.key();
                doc == document_id && seq >= from_sequence
            })
            .map(|entry| *entry.key())
            .collect();
        for key in &stale {
            self.chunks.remove(key);
        }
        Ok(stale.len() as u32)
    }

    async fn chunks_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.clone())
            .collect();
        chunks.sort_by_key(|c| c.sequence);
        Ok(chunks)
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = self.chunks.iter().map(|c| c.clone()).collect();
        chunks.sort_by_key(|c| (c.document_id, c.sequence));
        Ok(chunks)
    }

    async fn put_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        Ok(self.tickets.get(&id).map(|t| t.clone()))
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        if !self.tickets.contains_key(&ticket.id) {
            return Err(Error::NotFound(format!("ticket {}", ticket.id)));
        }
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn tickets_for_event(&self, event_id: Uuid) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| t.clone())
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }
}
