//! support-rag: event-support document ingestion and ticket auto-answer core
//!
//! Attendees ask questions (tickets) about an event; organizers upload
//! reference documents. This crate ingests those documents into a per-event
//! corpus index and answers new tickets from the indexed passages when the
//! retrieval confidence is high enough, deferring to a human otherwise.
//!
//! Record storage, blob storage, embeddings, and answer generation are
//! injected capabilities, so the retrieval and chunking logic runs unchanged
//! against in-memory fakes in tests and real providers in production.

pub mod answer;
pub mod config;
pub mod error;
pub mod extraction;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod service;
pub mod storage;
pub mod tickets;
pub mod types;

pub use config::SupportConfig;
pub use error::{Error, Result};
pub use service::SupportService;
pub use types::{
    document::{Chunk, Document, DocumentFormat, DocumentStatus},
    ticket::{Ticket, TicketStatus},
};
