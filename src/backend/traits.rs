//! Backend trait definitions
//!
//! The external collaborators of the conversation pipeline: completion
//! providers, speech-to-text and text-to-speech gateways. Every method returns
//! a typed failure instead of panicking so callers can degrade per tier.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::VoiceId;
use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Completion
// ─────────────────────────────────────────────────────────────────

/// One completion request: identity prompt, turn prompt and sampling limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub identity_prompt: String,
    pub turn_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-completion provider, tried as one tier of the chain.
///
/// The chain bounds each call with its own timeout, so implementations may
/// take as long as the remote side does.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier used in logs and attempt records (e.g., "groq")
    fn id(&self) -> &str;

    /// False when credentials or configuration are missing
    fn is_configured(&self) -> bool;

    /// Request a completion. An empty reply is returned as-is.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────
// Speech
// ─────────────────────────────────────────────────────────────────

/// Container format hint for inbound audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Webm,
    Wav,
    Mp3,
    Ogg,
    M4a,
}

impl AudioEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Webm => "webm",
            AudioEncoding::Wav => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Ogg => "ogg",
            AudioEncoding::M4a => "m4a",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Webm => "audio/webm",
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::Ogg => "audio/ogg",
            AudioEncoding::M4a => "audio/mp4",
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches("audio/") {
            "webm" => Ok(AudioEncoding::Webm),
            "wav" | "wave" | "x-wav" => Ok(AudioEncoding::Wav),
            "mp3" | "mpeg" => Ok(AudioEncoding::Mp3),
            "ogg" => Ok(AudioEncoding::Ogg),
            "m4a" | "mp4" => Ok(AudioEncoding::M4a),
            other => Err(format!("Unsupported audio encoding '{}'", other)),
        }
    }
}

/// Audio bytes in, transcript out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Gateway identifier used in logs
    fn id(&self) -> &str;

    async fn transcribe(&self, audio: &[u8], encoding: AudioEncoding) -> Result<String>;
}

/// Text in, audio bytes out.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn id(&self) -> &str;

    async fn synthesize(&self, text: &str, voice: VoiceId, speaking_rate: f32) -> Result<Vec<u8>>;
}

// ─────────────────────────────────────────────────────────────────
// Arc wrappers for trait objects
// ─────────────────────────────────────────────────────────────────

/// Type alias for a shared completion provider
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Type alias for a shared transcription gateway
pub type SharedSpeechToText = Arc<dyn SpeechToText>;

/// Type alias for a shared synthesis gateway
pub type SharedTextToSpeech = Arc<dyn TextToSpeech>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_hint() {
        assert_eq!("webm".parse::<AudioEncoding>().unwrap(), AudioEncoding::Webm);
        assert_eq!("audio/mpeg".parse::<AudioEncoding>().unwrap(), AudioEncoding::Mp3);
        assert_eq!("WAV".parse::<AudioEncoding>().unwrap(), AudioEncoding::Wav);
        assert!("flac".parse::<AudioEncoding>().is_err());
    }

    #[test]
    fn test_encoding_defaults_to_webm() {
        let encoding = AudioEncoding::default();
        assert_eq!(encoding.extension(), "webm");
        assert_eq!(encoding.mime_type(), "audio/webm");
    }
}
