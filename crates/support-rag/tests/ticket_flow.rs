//! Ticket lifecycle and auto-answer behavior through the service facade

mod common;

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use support_rag::storage::{MemoryStore, RecordStore};
use support_rag::types::document::hash_content;
use support_rag::types::{Chunk, Document, DocumentStatus, TicketStatus};
use support_rag::Error;

use common::*;

const VENUE_NOTES: &str =
    "Parking is available on level 2 of the venue garage. Doors open at 9am sharp.";

async fn harness_with_corpus() -> (Harness, Uuid) {
    let h = start_default().await;
    let event_id = Uuid::new_v4();
    let document = h
        .service
        .upload_document(event_id, "venue.txt", Bytes::from_static(VENUE_NOTES.as_bytes()))
        .await
        .unwrap();
    wait_for_terminal(&h.store, document.id).await;
    (h, event_id)
}

#[tokio::test]
async fn confident_question_is_auto_answered() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Answered);
    assert_eq!(ticket.auto_answer.as_deref(), Some(CANNED_ANSWER));
    assert!(ticket.auto_answer_score.unwrap() >= 0.35);
    assert!(ticket.answered_at.is_some());
    assert!(ticket.answer.is_none());
    assert_eq!(ticket.display_answer(), Some(CANNED_ANSWER));

    // the stored record matches what the caller got back
    let stored = h.service.ticket(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Answered);
    assert_eq!(stored.auto_answer.as_deref(), Some(CANNED_ANSWER));
}

#[tokio::test]
async fn unrelated_question_stays_open() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Can I bring my dog?".into())
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(ticket.auto_answer.is_none());
    assert!(ticket.auto_answer_score.is_none());
    assert!(ticket.answered_at.is_none());
}

#[tokio::test]
async fn generation_outage_never_fails_ticket_creation() {
    let h = start_with(Arc::new(VocabEmbedder), Arc::new(UnavailableGenerator)).await;
    let event_id = Uuid::new_v4();
    let document = h
        .service
        .upload_document(event_id, "venue.txt", Bytes::from_static(VENUE_NOTES.as_bytes()))
        .await
        .unwrap();
    wait_for_terminal(&h.store, document.id).await;

    // the match is confident, but generation is down
    let ticket = h
        .service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(ticket.auto_answer.is_none());
    assert!(ticket.auto_answer_score.is_none());
}

#[tokio::test]
async fn stale_encoder_version_declines_instead_of_answering() {
    // the store already holds a ready document embedded by a previous encoder
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let mut document = Document::new(
        event_id,
        "venue.txt".into(),
        "file:///uploads/venue.txt".into(),
        hash_content(b"venue"),
    );
    document.status = DocumentStatus::Ready;
    document.chunk_count = 1;
    store.put_document(&document).await.unwrap();
    let chunk = Chunk::new(
        document.id,
        event_id,
        0,
        "Parking is available on level 2.".into(),
        6,
        vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "vocab-v0".into(),
    );
    store.upsert_chunk(&chunk).await.unwrap();

    let h = start_on_store(store, Arc::new(VocabEmbedder), Arc::new(CannedGenerator)).await;
    let ticket = h
        .service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(ticket.auto_answer.is_none());
}

#[tokio::test]
async fn human_reply_wins_over_auto_answer() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Answered);

    let replied = h
        .service
        .reply_to_ticket(ticket.id, "Level 3 this weekend, level 2 is closed.".into())
        .await
        .unwrap();
    assert_eq!(replied.status, TicketStatus::Answered);
    assert_eq!(
        replied.display_answer(),
        Some("Level 3 this weekend, level 2 is closed.")
    );
    // the automatic answer is kept but no longer shown
    assert_eq!(replied.auto_answer.as_deref(), Some(CANNED_ANSWER));
}

#[tokio::test]
async fn flag_from_answered_then_reply_then_close() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Answered);

    // organizer disagrees with the automatic answer
    let flagged = h.service.flag_ticket(ticket.id).await.unwrap();
    assert_eq!(flagged.status, TicketStatus::Flagged);

    // a flagged ticket cannot be closed without a reply
    assert!(matches!(
        h.service.close_ticket(ticket.id).await,
        Err(Error::InvalidTransition { .. })
    ));

    let replied = h
        .service
        .reply_to_ticket(ticket.id, "Corrected: parking is on level 3.".into())
        .await
        .unwrap();
    assert_eq!(replied.status, TicketStatus::Answered);

    let closed = h.service.close_ticket(ticket.id).await.unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
}

#[tokio::test]
async fn flag_from_open_then_reply() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Can I bring my dog?".into())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);

    let flagged = h.service.flag_ticket(ticket.id).await.unwrap();
    assert_eq!(flagged.status, TicketStatus::Flagged);

    let replied = h
        .service
        .reply_to_ticket(ticket.id, "Service animals only, sorry.".into())
        .await
        .unwrap();
    assert_eq!(replied.status, TicketStatus::Answered);
    assert_eq!(replied.display_answer(), Some("Service animals only, sorry."));
}

#[tokio::test]
async fn closed_ticket_rejects_all_mutation() {
    let (h, event_id) = harness_with_corpus().await;

    let ticket = h
        .service
        .create_ticket(event_id, "Can I bring my dog?".into())
        .await
        .unwrap();
    h.service.close_ticket(ticket.id).await.unwrap();

    assert!(matches!(
        h.service.reply_to_ticket(ticket.id, "too late".into()).await,
        Err(Error::TicketClosed(_))
    ));
    assert!(matches!(
        h.service.flag_ticket(ticket.id).await,
        Err(Error::TicketClosed(_))
    ));
    assert!(matches!(
        h.service.close_ticket(ticket.id).await,
        Err(Error::TicketClosed(_))
    ));
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let h = start_default().await;
    assert!(matches!(
        h.service.flag_ticket(Uuid::new_v4()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn tickets_are_listed_per_event() {
    let (h, event_id) = harness_with_corpus().await;
    let other_event = Uuid::new_v4();

    h.service
        .create_ticket(event_id, "Where can attendees find parking?".into())
        .await
        .unwrap();
    h.service
        .create_ticket(event_id, "Can I bring my dog?".into())
        .await
        .unwrap();
    h.service
        .create_ticket(other_event, "Is there wifi?".into())
        .await
        .unwrap();

    assert_eq!(h.service.tickets_for_event(event_id).await.unwrap().len(), 2);
    assert_eq!(
        h.service.tickets_for_event(other_event).await.unwrap().len(),
        1
    );
}
