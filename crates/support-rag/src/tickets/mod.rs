//! Ticket operations over the record store
//!
//! Creation runs the answer engine; engine failures never fail the creation
//! itself. Every other operation loads the ticket, applies the state
//! machine, and persists the result, so an illegal transition is rejected
//! before anything is written.

use std::sync::Arc;

use uuid::Uuid;

use crate::answer::AnswerEngine;
use crate::error::{Error, Result};
use crate::storage::RecordStore;
use crate::types::Ticket;

pub struct TicketService {
    store: Arc<dyn RecordStore>,
    engine: Arc<AnswerEngine>,
}

impl TicketService {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<AnswerEngine>) -> Self {
        Self { store, engine }
    }

    /// Create a ticket and attempt an automatic answer.
    ///
    /// The returned ticket is already resolved to `open` or `answered`. The
    /// record is durable before the engine runs, so an engine failure (or a
    /// failure to persist its answer) leaves a plain open ticket.
    pub async fn create(&self, event_id: Uuid, question: String) -> Result<Ticket> {
        let mut ticket = Ticket::new(event_id, question);
        self.store.put_ticket(&ticket).await?;
        tracing::info!(ticket_id = %ticket.id, %event_id, "ticket created");

        let outcome = self.engine.answer(event_id, &ticket.question).await;
        if let (Some(answer), Some(score)) = (outcome.auto_answer, outcome.score) {
            let open = ticket.clone();
            if ticket.record_auto_answer(answer, score).is_ok() {
                match self.store.update_ticket(&ticket).await {
                    Ok(()) => {
                        tracing::info!(ticket_id = %ticket.id, score, "ticket auto-answered");
                    }
                    Err(e) => {
                        tracing::warn!(
                            ticket_id = %ticket.id,
                            error = %e,
                            "auto answer not persisted, ticket stays open"
                        );
                        return Ok(open);
                    }
                }
            }
        }
        Ok(ticket)
    }

    /// Human reply: forces `answered` from any state except `closed`.
    pub async fn reply(&self, ticket_id: Uuid, answer_text: String) -> Result<Ticket> {
        let mut ticket = self.load(ticket_id).await?;
        ticket.apply_reply(answer_text)?;
        self.store.update_ticket(&ticket).await?;
        tracing::info!(%ticket_id, "ticket answered by organizer");
        Ok(ticket)
    }

    /// Escalation flag, from `open` or `answered`.
    pub async fn flag(&self, ticket_id: Uuid) -> Result<Ticket> {
        let mut ticket = self.load(ticket_id).await?;
        ticket.apply_flag()?;
        self.store.update_ticket(&ticket).await?;
        tracing::info!(%ticket_id, "ticket flagged for escalation");
        Ok(ticket)
    }

    /// Close, from `open` or `answered`; a flagged ticket needs a reply first.
    pub async fn close(&self, ticket_id: Uuid) -> Result<Ticket> {
        let mut ticket = self.load(ticket_id).await?;
        ticket.apply_close()?;
        self.store.update_ticket(&ticket).await?;
        tracing::info!(%ticket_id, "ticket closed");
        Ok(ticket)
    }

    async fn load(&self, ticket_id: Uuid) -> Result<Ticket> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {}", ticket_id)))
    }
}
