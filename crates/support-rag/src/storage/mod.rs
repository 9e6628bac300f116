//! Durable record storage behind an injectable repository interface
//!
//! Every component takes the store as a trait object, so tests run against
//! `MemoryStore` and deployments against `SqliteStore` without touching the
//! pipeline code.

pub mod blob;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Chunk, Document, Ticket};

pub use blob::{BlobStore, FsBlobStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Typed record store over documents, chunks, and tickets
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ---- documents ----

    async fn put_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    async fn documents_for_event(&self, event_id: Uuid) -> Result<Vec<Document>>;

    /// Atomically move a document into `processing`.
    ///
    /// Legal from `pending`, `ready`, or `failed` (explicit re-ingestion);
    /// a document already `processing` yields `AlreadyInProgress`. This gate
    /// is what guarantees at-most-one concurrent ingestion per document.
    async fn begin_processing(&self, document_id: Uuid) -> Result<Document>;

    async fn mark_ready(
        &self,
        document_id: Uuid,
        chunk_count: u32,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_failed(&self, document_id: Uuid, reason: &str) -> Result<()>;

    // ---- chunks ----

    /// Insert or replace, keyed on `(document_id, sequence)` so retries
    /// never duplicate chunks.
    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Delete chunks of a document with `sequence >= from_sequence`.
    /// Returns how many were removed.
    async fn delete_chunks_from(&self, document_id: Uuid, from_sequence: u32) -> Result<u32>;

    /// Chunks of one document, ordered by sequence
    async fn chunks_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    /// All chunks across events, for rebuilding the corpus index at startup
    async fn all_chunks(&self) -> Result<Vec<Chunk>>;

    // ---- tickets ----

    async fn put_ticket(&self, ticket: &Ticket) -> Result<()>;

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>>;

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()>;

    async fn tickets_for_event(&self, event_id: Uuid) -> Result<Vec<Ticket>>;
}
