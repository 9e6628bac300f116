//! Background ingestion queue and worker
//!
//! Jobs flow to the worker over a bounded mpsc channel; a semaphore caps
//! concurrent document runs. The submitter claims the document's processing
//! gate before enqueueing, and from then on the document status field is the
//! only completion signal it observes.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::error::{Error, Result};

use super::pipeline::IngestionPipeline;

/// One queued ingestion run
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub event_id: Uuid,
    pub document_id: Uuid,
    pub data: Bytes,
    pub filename: String,
}

/// Submission side of the ingestion queue
pub struct IngestQueue {
    sender: mpsc::Sender<IngestJob>,
}

impl IngestQueue {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<IngestJob>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting; a full queue fails fast instead of blocking
    /// the submitting request.
    pub fn submit(&self, job: IngestJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Internal("ingestion queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal("ingestion worker has stopped".into())
            }
        })
    }
}

/// Drains the queue, running each job to a terminal document state
pub struct IngestWorker {
    pipeline: Arc<IngestionPipeline>,
    limit: Arc<Semaphore>,
}

impl IngestWorker {
    pub fn new(pipeline: Arc<IngestionPipeline>, processing: &ProcessingConfig) -> Self {
        let parallel = processing.effective_parallel_documents();
        tracing::info!(parallel_documents = parallel, "ingestion worker configured");
        Self {
            pipeline,
            limit: Arc::new(Semaphore::new(parallel)),
        }
    }

    /// Run until every submitter has dropped its queue handle.
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        tracing::info!("ingestion worker started");
        while let Some(job) = receiver.recv().await {
            let permit = match Arc::clone(&self.limit).acquire_owned().await {
                Ok(permit) => permit,
                // the semaphore is never closed; stop draining if it is
                Err(_) => break,
            };
            let pipeline = Arc::clone(&self.pipeline);
            tokio::spawn(async move {
                let _permit = permit;
                let document_id = job.document_id;
                if let Err(e) = pipeline
                    .run_claimed(job.event_id, job.document_id, job.data, &job.filename)
                    .await
                {
                    // run_claimed records processing failures on the document
                    // itself; reaching here means the status write failed
                    tracing::error!(%document_id, error = %e, "ingestion run could not record its outcome");
                }
            });
        }
        tracing::info!("ingestion worker stopped");
    }
}
