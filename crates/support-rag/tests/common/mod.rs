//! Shared fixtures: deterministic providers and a running service harness

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use support_rag::providers::{EmbeddingProvider, GenerationProvider};
use support_rag::storage::{FsBlobStore, MemoryStore, RecordStore};
use support_rag::types::Document;
use support_rag::{Error, Result, SupportConfig, SupportService};

pub const ENCODER_VERSION: &str = "vocab-v1";
pub const VOCAB: &[&str] = &["parking", "doors", "wifi", "schedule", "refund", "lunch"];
pub const CANNED_ANSWER: &str = "Check the venue guide: parking is on level 2.";

/// Small windows so short fixture texts produce several chunks; sequential
/// embedding keeps stub call order deterministic.
pub fn test_config() -> SupportConfig {
    let mut config = SupportConfig::default();
    config.chunking.window_tokens = 20;
    config.chunking.overlap_tokens = 5;
    config.retrieval.top_k = 3;
    config.retrieval.min_confidence = 0.35;
    config.processing.parallel_embeddings = Some(1);
    config
}

/// Embeds text as term counts over a fixed vocabulary. Texts sharing no
/// vocabulary words embed to the zero vector and score 0 against anything,
/// which keeps confidence gating deterministic.
pub struct VocabEmbedder;

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }

    fn version(&self) -> &str {
        ENCODER_VERSION
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "vocab-stub"
    }
}

/// Embeds like `VocabEmbedder` but fails calls `fail_from..fail_until`
/// (zero-based, counted over the provider's lifetime).
pub struct FailingEmbedder {
    calls: AtomicUsize,
    fail_from: usize,
    fail_until: usize,
}

impl FailingEmbedder {
    pub fn new(fail_from: usize, fail_until: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_from,
            fail_until,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_from && call < self.fail_until {
            return Err(Error::Embedding("stub embedder offline".into()));
        }
        VocabEmbedder.embed(text).await
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }

    fn version(&self) -> &str {
        ENCODER_VERSION
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "failing-vocab-stub"
    }
}

#[derive(Default)]
pub struct CannedGenerator;

#[async_trait]
impl GenerationProvider for CannedGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Ok(CANNED_ANSWER.into())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "canned-stub"
    }

    fn model(&self) -> &str {
        "canned-1"
    }
}

pub struct UnavailableGenerator;

#[async_trait]
impl GenerationProvider for UnavailableGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Err(Error::GenerationUnavailable("stub generator offline".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "unavailable-stub"
    }

    fn model(&self) -> &str {
        "none"
    }
}

pub struct Harness {
    pub service: SupportService,
    pub store: Arc<MemoryStore>,
    _blob_dir: TempDir,
}

pub async fn start_default() -> Harness {
    start_with(Arc::new(VocabEmbedder), Arc::new(CannedGenerator)).await
}

pub async fn start_with(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> Harness {
    start_on_store(Arc::new(MemoryStore::new()), embedder, generator).await
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start against a pre-populated store, e.g. to exercise index rebuild.
pub async fn start_on_store(
    store: Arc<MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> Harness {
    init_tracing();
    let blob_dir = tempfile::tempdir().expect("create blob tempdir");
    let blobs = Arc::new(FsBlobStore::new(blob_dir.path().to_path_buf()));
    let record_store: Arc<dyn RecordStore> = store.clone() as Arc<dyn RecordStore>;
    let service = SupportService::start(test_config(), record_store, blobs, embedder, generator)
        .await
        .expect("service start");
    Harness {
        service,
        store,
        _blob_dir: blob_dir,
    }
}

/// Poll until the document reaches `ready` or `failed`.
pub async fn wait_for_terminal(store: &MemoryStore, document_id: Uuid) -> Document {
    for _ in 0..500 {
        if let Some(document) = store.get_document(document_id).await.expect("get document") {
            if document.status.is_terminal() {
                return document;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document {} never reached a terminal status", document_id);
}

/// `n` distinct filler words with no vocabulary overlap
pub fn filler_words(n: usize) -> String {
    (0..n)
        .map(|i| format!("item{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}
