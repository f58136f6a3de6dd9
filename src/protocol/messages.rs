//! Session message definitions
//!
//! All messages exchanged with a client over the session WebSocket.
//! Messages are serialized as JSON with a `type` discriminator.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::AudioEncoding;
use crate::conversation::VoiceId;
use crate::error::{Error, Result};
use crate::persona::PersonaInput;
use crate::session::{InboundUnit, SessionSummary, UnitReply};

// ─────────────────────────────────────────────────────────────────
// Client → Server
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a session with an inline persona (only on `/session`)
    StartSession { persona: PersonaInput },

    /// Base64 audio recorded by the client
    AudioChunk {
        audio: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encoding: Option<String>,
    },

    /// Typed utterance, bypassing transcription
    TextMessage { text: String },

    /// Explicit end of the conversation
    EndConversation,
}

impl ClientMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::StartSession { .. } => "start_session",
            ClientMessage::AudioChunk { .. } => "audio_chunk",
            ClientMessage::TextMessage { .. } => "text_message",
            ClientMessage::EndConversation => "end_conversation",
        }
    }

    /// Convert an utterance message into a pipeline unit.
    ///
    /// Returns `Ok(None)` for control messages.
    pub fn into_unit(self) -> Result<Option<InboundUnit>> {
        match self {
            ClientMessage::AudioChunk { audio, encoding } => {
                let encoding = match encoding {
                    Some(hint) => hint
                        .parse::<AudioEncoding>()
                        .map_err(|message| Error::ProtocolMalformed { message })?,
                    None => AudioEncoding::default(),
                };
                let bytes = BASE64.decode(strip_data_url(&audio)).map_err(|e| Error::ProtocolMalformed {
                    message: format!("Audio is not valid base64: {}", e),
                })?;
                Ok(Some(InboundUnit::Audio { bytes, encoding }))
            }
            ClientMessage::TextMessage { text } => Ok(Some(InboundUnit::Text(text))),
            ClientMessage::StartSession { .. } | ClientMessage::EndConversation => Ok(None),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ProtocolMalformed {
            message: format!("Invalid message: {}", e),
        })
    }
}

/// Browsers often send `data:audio/webm;base64,...`; keep only the payload.
fn strip_data_url(audio: &str) -> &str {
    match audio.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => audio,
    }
}

// ─────────────────────────────────────────────────────────────────
// Server → Client
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionStarted {
        session_id: Uuid,
        persona: String,
        voice: VoiceId,
        greeting: String,
    },

    VoiceResponse {
        /// Base64 audio; absent when synthesis failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        transcript: String,
        persona_text: String,
        voice: VoiceId,
    },

    Error { message: String },

    SessionEnded { session_id: Uuid, turns: usize },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(format!("Failed to encode message: {}", e)))
    }
}

impl From<UnitReply> for ServerMessage {
    fn from(reply: UnitReply) -> Self {
        ServerMessage::VoiceResponse {
            audio: reply.audio.map(|bytes| BASE64.encode(bytes)),
            transcript: reply.transcript,
            persona_text: reply.persona_text,
            voice: reply.voice.voice,
        }
    }
}

impl From<SessionSummary> for ServerMessage {
    fn from(summary: SessionSummary) -> Self {
        ServerMessage::SessionEnded {
            session_id: summary.session_id,
            turns: summary.turns,
        }
    }
}
