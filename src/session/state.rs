//! Conversation session state
//!
//! One session binds an immutable persona to an append-only turn history.
//! Status moves from ongoing to completed exactly once.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::conversation::{ConversationTurn, Speaker};
use crate::error::{Error, Result};
use crate::persona::Persona;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ongoing,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Ongoing => write!(f, "ongoing"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Snapshot sent to the caller when a session ends
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub turns: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    persona: Arc<Persona>,
    turns: Vec<ConversationTurn>,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl ConversationSession {
    pub fn new(persona: Arc<Persona>) -> Self {
        Self {
            id: Uuid::new_v4(),
            persona,
            turns: Vec::new(),
            status: SessionStatus::Ongoing,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == SessionStatus::Ongoing
    }

    /// Append the founder's utterance and the persona's reply together.
    pub fn append_exchange(&mut self, founder: impl Into<String>, reply: impl Into<String>) -> Result<()> {
        if !self.is_ongoing() {
            return Err(Error::SessionClosed {
                session_id: self.id.to_string(),
            });
        }

        let next = self.turns.len();
        self.turns.push(ConversationTurn::new(Speaker::Founder, founder, next));
        self.turns.push(ConversationTurn::new(Speaker::Persona, reply, next + 1));
        Ok(())
    }

    /// Mark the session completed. Returns false if it already was.
    pub fn complete(&mut self) -> bool {
        if !self.is_ongoing() {
            return false;
        }
        self.status = SessionStatus::Completed;
        self.ended_at = Some(Utc::now());
        true
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            turns: self.turns.len(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaInput;

    fn session() -> ConversationSession {
        let persona = Persona::from_input(PersonaInput {
            name: "Marcus Rivera".into(),
            role: "Restaurant Owner".into(),
            ..Default::default()
        })
        .unwrap();
        ConversationSession::new(Arc::new(persona))
    }

    #[test]
    fn test_new_session_is_ongoing_and_empty() {
        let s = session();
        assert!(s.is_ongoing());
        assert!(s.turns().is_empty());
        assert_eq!(s.persona().name(), "Marcus Rivera");
    }

    #[test]
    fn test_append_exchange_orders_turns() {
        let mut s = session();
        s.append_exchange("Hi", "Hey.").unwrap();
        s.append_exchange("Busy?", "Always.").unwrap();

        let turns = s.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].speaker, Speaker::Founder);
        assert_eq!(turns[1].speaker, Speaker::Persona);
        assert_eq!(turns[3].message, "Always.");
        assert!(turns.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut s = session();
        assert!(s.complete());
        assert!(!s.complete());
        assert_eq!(s.status(), SessionStatus::Completed);

        let err = s.append_exchange("Hello?", "...").unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
        assert!(s.turns().is_empty());
    }

    #[test]
    fn test_summary() {
        let mut s = session();
        s.append_exchange("Hi", "Hey.").unwrap();
        s.complete();

        let summary = s.summary();
        assert_eq!(summary.session_id, s.id());
        assert_eq!(summary.turns, 2);
        assert!(summary.ended_at.is_some());
    }
}
