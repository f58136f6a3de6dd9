//! Mock backends for testing
//!
//! Scripted completion providers and speech gateways with call counting, so
//! chain and orchestrator tests can force every tier outcome deterministically.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::time::Duration;

use crate::conversation::VoiceId;
use crate::error::{Error, Result};

use super::{AudioEncoding, CompletionProvider, CompletionRequest, SpeechToText, TextToSpeech};

// ─────────────────────────────────────────────────────────────────
// Scripted completion provider
// ─────────────────────────────────────────────────────────────────

/// What a scripted provider does when called
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Hang,
}

pub struct ScriptedProvider {
    id: String,
    configured: bool,
    script: Script,
    calls: RwLock<u32>,
    last_request: RwLock<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, configured: bool, script: Script) -> Self {
        Self {
            id: id.to_string(),
            configured,
            script,
            calls: RwLock::new(0),
            last_request: RwLock::new(None),
        }
    }

    pub fn replying(id: &str, text: &str) -> Self {
        Self::new(id, true, Script::Reply(text.to_string()))
    }

    pub fn failing(id: &str) -> Self {
        Self::new(id, true, Script::Fail)
    }

    pub fn hanging(id: &str) -> Self {
        Self::new(id, true, Script::Hang)
    }

    pub fn unconfigured(id: &str) -> Self {
        Self::new(id, false, Script::Fail)
    }

    pub fn calls(&self) -> u32 {
        *self.calls.read()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.read().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        *self.calls.write() += 1;
        *self.last_request.write() = Some(request.clone());

        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(Error::provider_failed(&self.id, "API error 500: scripted failure")),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::provider_failed(&self.id, "unreachable"))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock speech gateway
// ─────────────────────────────────────────────────────────────────

/// Speech gateway that replays queued transcripts.
///
/// A `None` entry fails that transcription; an exhausted queue echoes the
/// audio bytes as UTF-8.
pub struct MockSpeech {
    transcripts: Mutex<VecDeque<Option<String>>>,
    fail_synthesis: bool,
    failures_time_out: bool,
    transcribe_delay: Duration,
    transcribe_calls: RwLock<u32>,
    synthesize_calls: RwLock<u32>,
    last_voice: RwLock<Option<VoiceId>>,
    last_text: RwLock<Option<String>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self {
            transcripts: Mutex::new(VecDeque::new()),
            fail_synthesis: false,
            failures_time_out: false,
            transcribe_delay: Duration::ZERO,
            transcribe_calls: RwLock::new(0),
            synthesize_calls: RwLock::new(0),
            last_voice: RwLock::new(None),
            last_text: RwLock::new(None),
        }
    }

    pub fn with_transcripts(transcripts: Vec<Option<&str>>) -> Self {
        let speech = Self::new();
        *speech.transcripts.lock() = transcripts
            .into_iter()
            .map(|t| t.map(str::to_string))
            .collect();
        speech
    }

    pub fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }

    /// Scripted failures report a gateway timeout instead of an error
    pub fn timing_out(mut self) -> Self {
        self.failures_time_out = true;
        self
    }

    pub fn with_transcribe_delay(mut self, delay: Duration) -> Self {
        self.transcribe_delay = delay;
        self
    }

    pub fn transcribe_calls(&self) -> u32 {
        *self.transcribe_calls.read()
    }

    pub fn synthesize_calls(&self) -> u32 {
        *self.synthesize_calls.read()
    }

    pub fn last_voice(&self) -> Option<VoiceId> {
        *self.last_voice.read()
    }

    pub fn last_text(&self) -> Option<String> {
        self.last_text.read().clone()
    }
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechToText for MockSpeech {
    fn id(&self) -> &str {
        "mock-speech"
    }

    async fn transcribe(&self, audio: &[u8], _encoding: AudioEncoding) -> Result<String> {
        *self.transcribe_calls.write() += 1;
        if !self.transcribe_delay.is_zero() {
            tokio::time::sleep(self.transcribe_delay).await;
        }

        let queued = self.transcripts.lock().pop_front();
        match queued {
            Some(Some(text)) => Ok(text),
            Some(None) if self.failures_time_out => Err(Error::transcription_timeout("scripted timeout")),
            Some(None) => Err(Error::transcription("scripted transcription failure")),
            None => Ok(String::from_utf8_lossy(audio).into_owned()),
        }
    }
}

#[async_trait]
impl TextToSpeech for MockSpeech {
    fn id(&self) -> &str {
        "mock-speech"
    }

    async fn synthesize(&self, text: &str, voice: VoiceId, _speaking_rate: f32) -> Result<Vec<u8>> {
        *self.synthesize_calls.write() += 1;
        *self.last_voice.write() = Some(voice);
        *self.last_text.write() = Some(text.to_string());

        if self.fail_synthesis {
            if self.failures_time_out {
                return Err(Error::synthesis_timeout("scripted timeout"));
            }
            return Err(Error::synthesis("scripted synthesis failure"));
        }
        Ok(format!("audio:{}", voice).into_bytes())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            identity_prompt: "id".to_string(),
            turn_prompt: "turn".to_string(),
            temperature: 0.3,
            max_tokens: 50,
        }
    }

    #[tokio::test]
    async fn test_scripted_reply_and_counts() {
        let provider = ScriptedProvider::replying("groq", "Sure.");
        assert_eq!(provider.complete(&request()).await.unwrap(), "Sure.");
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.last_request().unwrap().max_tokens, 50);
    }

    #[test]
    fn test_scripted_failure() {
        let provider = ScriptedProvider::failing("groq");
        assert!(matches!(
            tokio_test::block_on(provider.complete(&request())),
            Err(Error::ProviderFailed { .. })
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_speech_queue() {
        let speech = MockSpeech::with_transcripts(vec![Some("hello"), None]);
        assert_eq!(speech.transcribe(b"x", AudioEncoding::Webm).await.unwrap(), "hello");
        assert!(speech.transcribe(b"x", AudioEncoding::Webm).await.is_err());
        assert_eq!(speech.transcribe(b"echo", AudioEncoding::Webm).await.unwrap(), "echo");
        assert_eq!(speech.transcribe_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_synthesis_failure() {
        let speech = MockSpeech::new().failing_synthesis();
        assert!(speech.synthesize("hi", VoiceId::Echo, 1.0).await.is_err());
        assert_eq!(speech.last_voice(), Some(VoiceId::Echo));
    }

    #[tokio::test]
    async fn test_mock_speech_timeouts() {
        let speech = MockSpeech::with_transcripts(vec![None]).failing_synthesis().timing_out();
        assert!(speech.transcribe(b"x", AudioEncoding::Webm).await.unwrap_err().is_timeout());
        assert!(speech.synthesize("hi", VoiceId::Echo, 1.0).await.unwrap_err().is_timeout());
    }
}
