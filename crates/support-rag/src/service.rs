//! Facade wiring storage, index, ingestion, and ticket operations
//!
//! Construction rebuilds the corpus index from the durable chunk records and
//! starts the background ingestion worker. Record storage, blob storage,
//! embeddings, and generation all arrive as injected capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::answer::AnswerEngine;
use crate::config::SupportConfig;
use crate::error::Result;
use crate::index::CorpusIndex;
use crate::ingestion::{IngestJob, IngestQueue, IngestWorker, IngestionPipeline};
use crate::providers::{EmbeddingProvider, GenerationProvider, OllamaProvider};
use crate::storage::{BlobStore, FsBlobStore, RecordStore, SqliteStore};
use crate::tickets::TicketService;
use crate::types::document::hash_content;
use crate::types::{Document, DocumentFormat, DocumentStatus, Ticket};

pub struct SupportService {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    index: Arc<CorpusIndex>,
    queue: IngestQueue,
    tickets: TicketService,
}

impl SupportService {
    /// Wire the core from injected capabilities and start the background
    /// ingestion worker.
    pub async fn start(
        config: SupportConfig,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let index = Arc::new(CorpusIndex::new());
        // only ready documents serve query context; chunks a failed run left
        // behind stay in the store for the retry but are not searchable
        let mut ready_documents: HashMap<Uuid, bool> = HashMap::new();
        let mut restored = 0usize;
        for chunk in store.all_chunks().await? {
            let document_id = chunk.document_id;
            if !ready_documents.contains_key(&document_id) {
                let ready = store
                    .get_document(document_id)
                    .await?
                    .map(|d| d.status == DocumentStatus::Ready)
                    .unwrap_or(false);
                ready_documents.insert(document_id, ready);
            }
            if ready_documents[&document_id] {
                index.upsert(chunk)?;
                restored += 1;
            }
        }
        if restored > 0 {
            tracing::info!(chunks = restored, "corpus index rebuilt from record store");
        }

        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&store),
            Arc::clone(&index),
            Arc::clone(&embedder),
            config.chunking.clone(),
            &config.embeddings,
            &config.processing,
        ));
        let (queue, receiver) = IngestQueue::new(config.processing.queue_depth);
        tokio::spawn(IngestWorker::new(pipeline, &config.processing).run(receiver));

        let engine = Arc::new(AnswerEngine::new(
            Arc::clone(&store),
            Arc::clone(&index),
            embedder,
            generator,
            config.retrieval.clone(),
            &config.embeddings,
            &config.llm,
        ));
        let tickets = TicketService::new(Arc::clone(&store), engine);

        Ok(Self {
            store,
            blobs,
            index,
            queue,
            tickets,
        })
    }

    /// Production wiring: SQLite record store, filesystem blob store, and
    /// Ollama for embeddings and generation.
    pub async fn from_config(config: SupportConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(&config.storage.database_path)?);
        let blobs = Arc::new(FsBlobStore::new(config.storage.blob_dir.clone()));
        let (embedder, generator) = OllamaProvider::connect(&config.llm, &config.embeddings)?;
        Self::start(config, store, blobs, Arc::new(embedder), Arc::new(generator)).await
    }

    /// Store the raw upload, create the document record, and enqueue
    /// ingestion. Returns immediately with the pending record; progress is
    /// observed by polling `document()`.
    pub async fn upload_document(
        &self,
        event_id: Uuid,
        filename: &str,
        data: Bytes,
    ) -> Result<Document> {
        // reject unsupported extensions before any record exists
        DocumentFormat::from_filename(filename)?;

        let storage_url = self.blobs.put(filename, &data).await?;
        let document = Document::new(
            event_id,
            filename.to_string(),
            storage_url,
            hash_content(&data),
        );
        self.store.put_document(&document).await?;
        tracing::info!(document_id = %document.id, %event_id, filename, "document uploaded");

        self.ingest(event_id, document.id, data, filename).await?;
        Ok(document)
    }

    /// Fire-and-forget ingestion submit for an existing document record
    /// (also the explicit re-ingestion entry point).
    ///
    /// The call claims the document's processing gate, so a run still in
    /// flight rejects with `AlreadyInProgress`; everything after admission
    /// is observed on the document record.
    pub async fn ingest(
        &self,
        event_id: Uuid,
        document_id: Uuid,
        data: Bytes,
        filename: &str,
    ) -> Result<()> {
        self.store.begin_processing(document_id).await?;
        let job = IngestJob {
            event_id,
            document_id,
            data,
            filename: filename.to_string(),
        };
        if let Err(e) = self.queue.submit(job) {
            // the claim must not leak when the job never reached the queue
            self.store.mark_failed(document_id, &e.to_string()).await?;
            tracing::error!(%document_id, error = %e, "ingestion submit failed");
            return Err(e);
        }
        Ok(())
    }

    /// Create a ticket; the answer engine runs before it is returned, so
    /// `status` is already `open` or `answered`.
    pub async fn create_ticket(&self, event_id: Uuid, question: String) -> Result<Ticket> {
        self.tickets.create(event_id, question).await
    }

    pub async fn reply_to_ticket(&self, ticket_id: Uuid, answer_text: String) -> Result<Ticket> {
        self.tickets.reply(ticket_id, answer_text).await
    }

    pub async fn flag_ticket(&self, ticket_id: Uuid) -> Result<Ticket> {
        self.tickets.flag(ticket_id).await
    }

    pub async fn close_ticket(&self, ticket_id: Uuid) -> Result<Ticket> {
        self.tickets.close(ticket_id).await
    }

    pub async fn document(&self, document_id: Uuid) -> Result<Option<Document>> {
        self.store.get_document(document_id).await
    }

    pub async fn documents_for_event(&self, event_id: Uuid) -> Result<Vec<Document>> {
        self.store.documents_for_event(event_id).await
    }

    pub async fn ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>> {
        self.store.get_ticket(ticket_id).await
    }

    pub async fn tickets_for_event(&self, event_id: Uuid) -> Result<Vec<Ticket>> {
        self.store.tickets_for_event(event_id).await
    }

    /// Chunks currently searchable for an event
    pub fn indexed_chunk_count(&self, event_id: Uuid) -> usize {
        self.index.chunk_count(event_id)
    }
}
