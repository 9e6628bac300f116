//! End-to-end ingestion behavior through the service facade

mod common;

use bytes::Bytes;
use uuid::Uuid;

use support_rag::storage::RecordStore;
use support_rag::types::DocumentStatus;
use support_rag::Error;

use common::*;

#[tokio::test]
async fn upload_reaches_ready_with_dense_sequences() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();
    let text = filler_words(50);

    let document = h
        .service
        .upload_document(event_id, "guide.txt", Bytes::from(text.clone()))
        .await
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Pending);

    let done = wait_for_terminal(&h.store, document.id).await;
    assert_eq!(done.status, DocumentStatus::Ready);
    // window 20 / overlap 5: windows start at tokens 0, 15, 30
    assert_eq!(done.chunk_count, 3);
    assert!(done.processed_at.is_some());
    assert!(done.failure_reason.is_none());

    let chunks = h.store.chunks_for_document(document.id).await.unwrap();
    let sequences: Vec<u32> = chunks.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert!(chunks.iter().all(|c| c.encoder_version == ENCODER_VERSION));

    // overlap removal reconstructs the extracted text
    let original: Vec<&str> = text.split_whitespace().collect();
    let mut rebuilt: Vec<String> = Vec::new();
    for chunk in &chunks {
        let token_start = chunk.sequence as usize * 15;
        let already = rebuilt.len() - token_start;
        rebuilt.extend(
            chunk
                .text
                .split_whitespace()
                .skip(already)
                .map(str::to_string),
        );
    }
    assert_eq!(rebuilt, original);
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();
    let text = filler_words(50);

    let document = h
        .service
        .upload_document(event_id, "guide.txt", Bytes::from(text.clone()))
        .await
        .unwrap();
    let first = wait_for_terminal(&h.store, document.id).await;
    let first_texts: Vec<String> = h
        .store
        .chunks_for_document(document.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.text.clone())
        .collect();

    // explicit re-ingestion of the unchanged content
    h.service
        .ingest(event_id, document.id, Bytes::from(text), "guide.txt")
        .await
        .unwrap();
    let second = wait_for_terminal(&h.store, document.id).await;

    assert_eq!(second.status, DocumentStatus::Ready);
    assert_eq!(second.chunk_count, first.chunk_count);
    let second_texts: Vec<String> = h
        .store
        .chunks_for_document(document.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.text.clone())
        .collect();
    assert_eq!(second_texts, first_texts);
    assert_eq!(
        h.service.indexed_chunk_count(event_id),
        first.chunk_count as usize
    );
}

#[tokio::test]
async fn empty_document_is_ready_with_no_chunks() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();

    let document = h
        .service
        .upload_document(event_id, "empty.txt", Bytes::new())
        .await
        .unwrap();
    let done = wait_for_terminal(&h.store, document.id).await;

    assert_eq!(done.status, DocumentStatus::Ready);
    assert_eq!(done.chunk_count, 0);
    assert!(h
        .store
        .chunks_for_document(document.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.service.indexed_chunk_count(event_id), 0);

    // the only document is empty, so every question stays with a human
    let ticket = h
        .service
        .create_ticket(event_id, "Where is parking?".into())
        .await
        .unwrap();
    assert!(ticket.auto_answer.is_none());
}

#[tokio::test]
async fn corrupt_upload_fails_with_recorded_reason() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();

    let document = h
        .service
        .upload_document(event_id, "notes.pdf", Bytes::from_static(b"not a pdf at all"))
        .await
        .unwrap();
    let done = wait_for_terminal(&h.store, document.id).await;

    assert_eq!(done.status, DocumentStatus::Failed);
    assert!(done.failure_reason.unwrap().contains("corrupt document"));
    // no partial chunks reached the store or the index
    assert!(h
        .store
        .chunks_for_document(document.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.service.indexed_chunk_count(event_id), 0);
}

#[tokio::test]
async fn unsupported_extension_is_rejected_at_upload() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();

    let result = h
        .service
        .upload_document(event_id, "slides.pptx", Bytes::from_static(b"zip bytes"))
        .await;
    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    assert!(h
        .service
        .documents_for_event(event_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn embedding_failure_keeps_prefix_and_retry_completes() {
    // call 0 succeeds, call 1 fails, everything afterwards succeeds
    let h = start_with(
        std::sync::Arc::new(FailingEmbedder::new(1, 2)),
        std::sync::Arc::new(CannedGenerator),
    )
    .await;
    let event_id = Uuid::new_v4();
    let text = filler_words(50);

    let document = h
        .service
        .upload_document(event_id, "guide.txt", Bytes::from(text.clone()))
        .await
        .unwrap();
    let failed = wait_for_terminal(&h.store, document.id).await;
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert!(failed.failure_reason.unwrap().contains("embedding"));

    // the chunk embedded before the failure is retained in the store, but a
    // partial document serves no query context
    let retained = h.store.chunks_for_document(document.id).await.unwrap();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].sequence, 0);
    assert_eq!(h.service.indexed_chunk_count(event_id), 0);

    // retry after the failed outcome overwrites by sequence, no duplicates
    h.service
        .ingest(event_id, document.id, Bytes::from(text), "guide.txt")
        .await
        .unwrap();
    let done = wait_for_terminal(&h.store, document.id).await;
    assert_eq!(done.status, DocumentStatus::Ready);
    assert_eq!(done.chunk_count, 3);
    assert_eq!(h.service.indexed_chunk_count(event_id), 3);
    let chunks = h.store.chunks_for_document(document.id).await.unwrap();
    let sequences: Vec<u32> = chunks.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[tokio::test]
async fn shorter_reingestion_prunes_stale_tail() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();

    let document = h
        .service
        .upload_document(event_id, "guide.txt", Bytes::from(filler_words(50)))
        .await
        .unwrap();
    let long = wait_for_terminal(&h.store, document.id).await;
    assert_eq!(long.chunk_count, 3);

    // re-upload shrank the document to a single window
    h.service
        .ingest(
            event_id,
            document.id,
            Bytes::from(filler_words(10)),
            "guide.txt",
        )
        .await
        .unwrap();
    let short = wait_for_terminal(&h.store, document.id).await;

    assert_eq!(short.status, DocumentStatus::Ready);
    assert_eq!(short.chunk_count, 1);
    assert_eq!(
        h.store.chunks_for_document(document.id).await.unwrap().len(),
        1
    );
    assert_eq!(h.service.indexed_chunk_count(event_id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingest_admits_exactly_one() {
    let h = start_default().await;
    let event_id = Uuid::new_v4();
    let text = filler_words(50);

    let document = h
        .service
        .upload_document(event_id, "guide.txt", Bytes::from(text.clone()))
        .await
        .unwrap();
    wait_for_terminal(&h.store, document.id).await;

    let (a, b) = tokio::join!(
        h.service
            .ingest(event_id, document.id, Bytes::from(text.clone()), "guide.txt"),
        h.service
            .ingest(event_id, document.id, Bytes::from(text.clone()), "guide.txt"),
    );
    let results = [a, b];
    let rejected: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(rejected.len(), 1, "exactly one submission wins the gate");
    assert!(matches!(rejected[0], Error::AlreadyInProgress(_)));

    let done = wait_for_terminal(&h.store, document.id).await;
    assert_eq!(done.status, DocumentStatus::Ready);
    assert_eq!(done.chunk_count, 3);
}
