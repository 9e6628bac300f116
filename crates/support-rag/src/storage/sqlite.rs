//! SQLite-backed record store
//!
//! Durable storage for documents, chunks, and tickets. WAL mode keeps
//! concurrent readers cheap while the ingestion worker writes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, DocumentStatus, Ticket, TicketStatus};

use super::RecordStore;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("failed to open database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::Storage(format!("failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                storage_url TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                processed_at TEXT,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                failure_reason TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_documents_event_id ON documents(event_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                text TEXT NOT NULL,
                token_estimate INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                encoder_version TEXT NOT NULL,
                UNIQUE(document_id, sequence)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_event_id ON chunks(event_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                question TEXT NOT NULL,
                status TEXT NOT NULL,
                auto_answer TEXT,
                auto_answer_score REAL,
                answer TEXT,
                created_at TEXT NOT NULL,
                answered_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_event_id ON tickets(event_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
        "#,
        )
        .map_err(|e| Error::Storage(format!("failed to run migrations: {}", e)))?;

        tracing::debug!("database migrations complete");
        Ok(())
    }
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: parse_uuid(row.get(0)?)?,
        event_id: parse_uuid(row.get(1)?)?,
        filename: row.get(2)?,
        storage_url: row.get(3)?,
        content_hash: row.get(4)?,
        uploaded_at: row.get(5)?,
        processed_at: row.get(6)?,
        chunk_count: row.get(7)?,
        status: DocumentStatus::from_str(&row.get::<_, String>(8)?)
            .unwrap_or(DocumentStatus::Failed),
        failure_reason: row.get(9)?,
    })
}

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let blob: Vec<u8> = row.get(6)?;
    Ok(Chunk {
        id: parse_uuid(row.get(0)?)?,
        document_id: parse_uuid(row.get(1)?)?,
        event_id: parse_uuid(row.get(2)?)?,
        sequence: row.get(3)?,
        text: row.get(4)?,
        token_estimate: row.get(5)?,
        embedding: blob_to_embedding(&blob),
        encoder_version: row.get(7)?,
    })
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: parse_uuid(row.get(0)?)?,
        event_id: parse_uuid(row.get(1)?)?,
        question: row.get(2)?,
        status: TicketStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(TicketStatus::Open),
        auto_answer: row.get(4)?,
        auto_answer_score: row.get(5)?,
        answer: row.get(6)?,
        created_at: row.get(7)?,
        answered_at: row.get(8)?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, event_id, filename, storage_url, content_hash, uploaded_at, \
     processed_at, chunk_count, status, failure_reason";
const CHUNK_COLUMNS: &str =
    "id, document_id, event_id, sequence, text, token_estimate, embedding, encoder_version";
const TICKET_COLUMNS: &str = "id, event_id, question, status, auto_answer, auto_answer_score, \
     answer, created_at, answered_at";

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO documents
                (id, event_id, filename, storage_url, content_hash, uploaded_at,
                 processed_at, chunk_count, status, failure_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                storage_url = excluded.storage_url,
                content_hash = excluded.content_hash,
                processed_at = excluded.processed_at,
                chunk_count = excluded.chunk_count,
                status = excluded.status,
                failure_reason = excluded.failure_reason
            "#,
            params![
                document.id.to_string(),
                document.event_id.to_string(),
                document.filename,
                document.storage_url,
                document.content_hash,
                document.uploaded_at,
                document.processed_at,
                document.chunk_count,
                document.status.as_str(),
                document.failure_reason,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(storage_err)
    }

    async fn documents_for_event(&self, event_id: Uuid) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents WHERE event_id = ?1 ORDER BY uploaded_at",
                DOCUMENT_COLUMNS
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![event_id.to_string()], row_to_document)
            .map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }

    async fn begin_processing(&self, document_id: Uuid) -> Result<Document> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE documents SET status = 'processing', failure_reason = NULL \
                 WHERE id = ?1 AND status != 'processing'",
                params![document_id.to_string()],
            )
            .map_err(storage_err)?;

        if updated == 0 {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM documents WHERE id = ?1",
                    params![document_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?;
            return match status {
                Some(_) => Err(Error::AlreadyInProgress(document_id)),
                None => Err(Error::NotFound(format!("document {}", document_id))),
            };
        }

        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![document_id.to_string()],
            row_to_document,
        )
        .map_err(storage_err)
    }

    async fn mark_ready(
        &self,
        document_id: Uuid,
        chunk_count: u32,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE documents SET status = 'ready', chunk_count = ?2, \
                 processed_at = ?3, failure_reason = NULL WHERE id = ?1",
                params![document_id.to_string(), chunk_count, processed_at],
            )
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }
        Ok(())
    }

    async fn mark_failed(&self, document_id: Uuid, reason: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE documents SET status = 'failed', failure_reason = ?2 WHERE id = ?1",
                params![document_id.to_string(), reason],
            )
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }
        Ok(())
    }

    async fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO chunks
                (id, document_id, event_id, sequence, text, token_estimate,
                 embedding, encoder_version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(document_id, sequence) DO UPDATE SET
                id = excluded.id,
                text = excluded.text,
                token_estimate = excluded.token_estimate,
                embedding = excluded.embedding,
                encoder_version = excluded.encoder_version
            "#,
            params![
                chunk.id.to_string(),
                chunk.document_id.to_string(),
                chunk.event_id.to_string(),
                chunk.sequence,
                chunk.text,
                chunk.token_estimate,
                embedding_to_blob(&chunk.embedding),
                chunk.encoder_version,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_chunks_from(&self, document_id: Uuid, from_sequence: u32) -> Result<u32> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM chunks WHERE document_id = ?1 AND sequence >= ?2",
                params![document_id.to_string(), from_sequence],
            )
            .map_err(storage_err)?;
        Ok(deleted as u32)
    }

    async fn chunks_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks WHERE document_id = ?1 ORDER BY sequence",
                CHUNK_COLUMNS
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![document_id.to_string()], row_to_chunk)
            .map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks ORDER BY document_id, sequence",
                CHUNK_COLUMNS
            ))
            .map_err(storage_err)?;
        let rows = stmt.query_map([], row_to_chunk).map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }

    async fn put_ticket(&self, ticket: &Ticket) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO tickets
                (id, event_id, question, status, auto_answer, auto_answer_score,
                 answer, created_at, answered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                ticket.id.to_string(),
                ticket.event_id.to_string(),
                ticket.question,
                ticket.status.as_str(),
                ticket.auto_answer,
                ticket.auto_answer_score,
                ticket.answer,
                ticket.created_at,
                ticket.answered_at,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS),
            params![id.to_string()],
            row_to_ticket,
        )
        .optional()
        .map_err(storage_err)
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                r#"
                UPDATE tickets SET
                    status = ?2,
                    auto_answer = ?3,
                    auto_answer_score = ?4,
                    answer = ?5,
                    answered_at = ?6
                WHERE id = ?1
                "#,
                params![
                    ticket.id.to_string(),
                    ticket.status.as_str(),
                    ticket.auto_answer,
                    ticket.auto_answer_score,
                    ticket.answer,
                    ticket.answered_at,
                ],
            )
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(Error::NotFound(format!("ticket {}", ticket.id)));
        }
        Ok(())
    }

    async fn tickets_for_event(&self, event_id: Uuid) -> Result<Vec<Ticket>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tickets WHERE event_id = ?1 ORDER BY created_at",
                TICKET_COLUMNS
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![event_id.to_string()], row_to_ticket)
            .map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }
}
