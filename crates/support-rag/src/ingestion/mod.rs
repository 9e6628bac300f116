//! Document ingestion: extract, chunk, embed, persist

pub mod chunker;
pub mod pipeline;
pub mod worker;

pub use chunker::{Passage, PassageChunker};
pub use pipeline::IngestionPipeline;
pub use worker::{IngestJob, IngestQueue, IngestWorker};
