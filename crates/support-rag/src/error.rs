//! Error taxonomy for ingestion, retrieval, and ticket operations

use uuid::Uuid;

use crate::types::ticket::TicketStatus;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upload declared a format outside {pdf, docx, txt}
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Parsing produced no recoverable text
    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    #[error("invalid chunk config: overlap {overlap} must be smaller than window {window}")]
    InvalidChunkConfig { window: usize, overlap: usize },

    /// A second ingestion was requested while one is still `processing`
    #[error("ingestion already in progress for document {0}")]
    AlreadyInProgress(Uuid),

    /// Query embedded with a different encoder than the stored chunks
    #[error("encoder version mismatch: index holds '{indexed}', query used '{query}'")]
    EncoderVersionMismatch { indexed: String, query: String },

    #[error("ticket {0} is closed")]
    TicketClosed(Uuid),

    #[error("cannot {action} a ticket in state '{from}'")]
    InvalidTransition {
        from: TicketStatus,
        action: &'static str,
    },

    /// Non-fatal: the answer engine downgrades this to declining to answer
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}
