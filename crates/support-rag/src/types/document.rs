//! Document and chunk records owned by the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    /// Derive the declared format from the uploaded filename's extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "text" => Ok(Self::Txt),
            other => Err(Error::UnsupportedFormat(format!(
                "'{}' (from '{}')",
                other, filename
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

/// Lifecycle of a document inside the ingestion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Record created, ingestion not yet started
    Pending,
    /// An ingestion run holds the document; a second run is rejected
    Processing,
    /// Terminal: chunks persisted, `chunk_count` authoritative
    Ready,
    /// Terminal: extraction or embedding failed, reason recorded
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Storage(format!("unknown document status '{}'", other))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// An organizer-uploaded reference document, owned by its event.
///
/// Mutated only by the ingestion pipeline after creation. Once `status` is
/// `Ready`, `chunk_count` equals the number of persisted chunks for this
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub event_id: Uuid,
    /// Original filename as uploaded by the organizer
    pub filename: String,
    /// URL returned by the blob store for the raw bytes
    pub storage_url: String,
    /// sha-256 of the raw bytes
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub chunk_count: u32,
    pub status: DocumentStatus,
    pub failure_reason: Option<String>,
}

impl Document {
    pub fn new(event_id: Uuid, filename: String, storage_url: String, content_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            filename,
            storage_url,
            content_hash,
            uploaded_at: Utc::now(),
            processed_at: None,
            chunk_count: 0,
            status: DocumentStatus::Pending,
            failure_reason: None,
        }
    }
}

/// A bounded passage of a document's extracted text, the unit of retrieval.
///
/// Immutable once created; replaced only via upsert keyed on
/// `(document_id, sequence)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub event_id: Uuid,
    /// Dense, zero-based position within the document's passage order
    pub sequence: u32,
    pub text: String,
    /// Whitespace-delimited word count, the unit the chunker windows over
    pub token_estimate: u32,
    pub embedding: Vec<f32>,
    /// Encoder that produced `embedding`; queries must match it
    pub encoder_version: String,
}

impl Chunk {
    pub fn new(
        document_id: Uuid,
        event_id: Uuid,
        sequence: u32,
        text: String,
        token_estimate: u32,
        embedding: Vec<f32>,
        encoder_version: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            event_id,
            sequence,
            text,
            token_estimate,
            embedding,
            encoder_version,
        }
    }
}

/// sha-256 content hash, hex-encoded
pub fn hash_content(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
