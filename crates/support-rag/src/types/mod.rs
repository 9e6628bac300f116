//! Record types shared across the pipeline

pub mod document;
pub mod ticket;

pub use document::{Chunk, Document, DocumentFormat, DocumentStatus};
pub use ticket::{Ticket, TicketStatus};
