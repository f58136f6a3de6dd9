//! Conversation turn types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Founder,
    Persona,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Founder => write!(f, "founder"),
            Speaker::Persona => write!(f, "persona"),
        }
    }
}

/// One utterance in a session. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub message: String,
    /// Zero-based arrival order within the session.
    pub index: usize,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(speaker: Speaker, message: impl Into<String>, index: usize) -> Self {
        Self {
            speaker,
            message: message.into(),
            index,
            at: Utc::now(),
        }
    }
}
