//! Ticket record and its state machine
//!
//! Transitions are monotonic (`open -> answered/flagged/closed`) except that
//! flagging an auto-answered ticket reopens escalation. Nothing leaves
//! `closed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Answered,
    Flagged,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
            Self::Flagged => "flagged",
            Self::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "answered" => Ok(Self::Answered),
            "flagged" => Ok(Self::Flagged),
            "closed" => Ok(Self::Closed),
            other => Err(Error::Storage(format!("unknown ticket status '{}'", other))),
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attendee question tied to an event.
///
/// `auto_answer`/`auto_answer_score` are written at most once, by the answer
/// engine right after creation. `answer` is written only by a human reply
/// and, once present, is authoritative over `auto_answer` for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub question: String,
    pub status: TicketStatus,
    pub auto_answer: Option<String>,
    pub auto_answer_score: Option<f32>,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(event_id: Uuid, question: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            question,
            status: TicketStatus::Open,
            auto_answer: None,
            auto_answer_score: None,
            answer: None,
            created_at: Utc::now(),
            answered_at: None,
        }
    }

    /// The answer an attendee should see: a human reply wins over the
    /// automatic one.
    pub fn display_answer(&self) -> Option<&str> {
        self.answer.as_deref().or(self.auto_answer.as_deref())
    }

    /// Record the answer engine's confident answer. Legal exactly once, on a
    /// freshly created `open` ticket.
    pub fn record_auto_answer(&mut self, answer: String, score: f32) -> Result<()> {
        if self.status == TicketStatus::Closed {
            return Err(Error::TicketClosed(self.id));
        }
        if self.status != TicketStatus::Open || self.auto_answer.is_some() {
            return Err(Error::InvalidTransition {
                from: self.status,
                action: "auto-answer",
            });
        }
        self.auto_answer = Some(answer);
        self.auto_answer_score = Some(score);
        self.status = TicketStatus::Answered;
        self.answered_at = Some(Utc::now());
        Ok(())
    }

    /// Human reply: legal from any state except `closed`, always forces
    /// `answered`.
    pub fn apply_reply(&mut self, answer: String) -> Result<()> {
        if self.status == TicketStatus::Closed {
            return Err(Error::TicketClosed(self.id));
        }
        self.answer = Some(answer);
        self.answered_at = Some(Utc::now());
        self.status = TicketStatus::Answered;
        Ok(())
    }

    /// Escalation flag: legal from `open`, or from `answered` when a human
    /// disagrees with the auto answer.
    pub fn apply_flag(&mut self) -> Result<()> {
        match self.status {
            TicketStatus::Closed => Err(Error::TicketClosed(self.id)),
            TicketStatus::Open | TicketStatus::Answered => {
                self.status = TicketStatus::Flagged;
                Ok(())
            }
            TicketStatus::Flagged => Err(Error::InvalidTransition {
                from: self.status,
                action: "flag",
            }),
        }
    }

    /// Close: legal from `open` or `answered`. A flagged ticket needs an
    /// explicit reply before it can be closed.
    pub fn apply_close(&mut self) -> Result<()> {
        match self.status {
            TicketStatus::Closed => Err(Error::TicketClosed(self.id)),
            TicketStatus::Flagged => Err(Error::InvalidTransition {
                from: self.status,
                action: "close",
            }),
            TicketStatus::Open | TicketStatus::Answered => {
                self.status = TicketStatus::Closed;
                Ok(())
            }
        }
    }
}
