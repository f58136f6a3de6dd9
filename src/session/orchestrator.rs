//! Streaming orchestrator
//!
//! Owns one conversation session and runs each inbound unit through
//! transcription, classification, prompt composition, the completion chain
//! and synthesis, strictly in order. Only persona validation at construction
//! can fail fatally; every later failure is scoped to a single unit.
//!
//! Turns are appended after the last await point of a unit, so dropping an
//! in-flight `handle_unit` future leaves the history untouched.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{AudioEncoding, CompletionChain, CompletionOutcome, SharedSpeechToText, SharedTextToSpeech};
use crate::config::DEFAULT_SPEAKING_RATE;
use crate::conversation::{classify, pace_for_speech, select_voice, PromptComposer, QuestionStyle, VoiceProfile};
use crate::error::{Error, Result};
use crate::persona::{Persona, PersonaInput};

use super::state::{ConversationSession, SessionStatus, SessionSummary};

/// Message sent to the caller when a unit cannot be understood.
pub const TRANSCRIPTION_APOLOGY: &str = "Sorry, I didn't catch that. Could you repeat?";

// ─────────────────────────────────────────────────────────────────
// Shared pipeline services
// ─────────────────────────────────────────────────────────────────

/// Read-only collaborators shared by every session.
pub struct PipelineServices {
    pub chain: CompletionChain,
    pub speech_to_text: SharedSpeechToText,
    pub text_to_speech: SharedTextToSpeech,
    pub composer: PromptComposer,
    pub speaking_rate: f32,
}

impl PipelineServices {
    pub fn new(
        chain: CompletionChain,
        speech_to_text: SharedSpeechToText,
        text_to_speech: SharedTextToSpeech,
    ) -> Self {
        Self {
            chain,
            speech_to_text,
            text_to_speech,
            composer: PromptComposer::default(),
            speaking_rate: DEFAULT_SPEAKING_RATE,
        }
    }

    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_speaking_rate(mut self, speaking_rate: f32) -> Self {
        self.speaking_rate = speaking_rate;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Units
// ─────────────────────────────────────────────────────────────────

/// One inbound message to process.
#[derive(Debug, Clone)]
pub enum InboundUnit {
    Audio { bytes: Vec<u8>, encoding: AudioEncoding },
    Text(String),
}

/// Result of one processed unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReply {
    /// What the founder said
    pub transcript: String,
    /// What the persona answered (unpaced)
    pub persona_text: String,
    pub voice: VoiceProfile,
    /// Synthesized speech; absent when synthesis failed
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub style: QuestionStyle,
    /// Provider id or `simulator`
    pub source: String,
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

pub struct StreamingOrchestrator {
    services: Arc<PipelineServices>,
    session: ConversationSession,
    voice: VoiceProfile,
    units: u64,
}

impl StreamingOrchestrator {
    /// Validate the persona and open a session. Invalid personas are fatal.
    pub fn new(services: Arc<PipelineServices>, input: PersonaInput) -> Result<Self> {
        let persona = Persona::from_input(input)?;
        Ok(Self::with_persona(services, Arc::new(persona)))
    }

    /// Open a session for an already validated persona.
    pub fn with_persona(services: Arc<PipelineServices>, persona: Arc<Persona>) -> Self {
        let voice = select_voice(persona.name(), persona.communication_style().unwrap_or(""));
        let session = ConversationSession::new(persona);

        info!(
            session_id = %session.id(),
            persona = %session.persona(),
            voice = %voice.voice,
            "Session started"
        );

        Self {
            services,
            session,
            voice,
            units: 0,
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn voice(&self) -> VoiceProfile {
        self.voice
    }

    /// Run one unit through the pipeline.
    ///
    /// Errors are unit-scoped (`Transcription`, `ProtocolMalformed`,
    /// `SessionClosed`); the session stays usable after any of them.
    pub async fn handle_unit(&mut self, unit: InboundUnit) -> Result<UnitReply> {
        if !self.session.is_ongoing() {
            return Err(Error::SessionClosed {
                session_id: self.session.id().to_string(),
            });
        }

        self.units += 1;
        let unit_no = self.units;
        let session_id = self.session.id();
        let started = Instant::now();

        let transcript = match unit {
            InboundUnit::Audio { bytes, encoding } => {
                let stt = &self.services.speech_to_text;
                let call_started = Instant::now();
                let text = stt.transcribe(&bytes, encoding).await.map_err(|e| {
                    warn!(
                        session_id = %session_id,
                        unit = unit_no,
                        provider = %stt.id(),
                        outcome = %CompletionOutcome::from_error(&e),
                        latency_ms = call_started.elapsed().as_millis() as u64,
                        error = %e,
                        "Transcription failed"
                    );
                    e
                })?;
                if text.trim().is_empty() {
                    warn!(session_id = %session_id, unit = unit_no, "Empty transcript");
                    return Err(Error::transcription("Empty transcript"));
                }
                text.trim().to_string()
            }
            InboundUnit::Text(text) => {
                if text.trim().is_empty() {
                    return Err(Error::ProtocolMalformed {
                        message: "Empty text message".to_string(),
                    });
                }
                text.trim().to_string()
            }
        };

        let persona = self.session.persona();
        let style = classify(&transcript);
        let prompt = self
            .services
            .composer
            .compose(persona, self.session.turns(), &transcript, style);
        debug!(session_id = %session_id, unit = unit_no, style = %style, "Prompt composed");

        let reply = self.services.chain.reply(&prompt, &transcript, persona).await;

        let tts = &self.services.text_to_speech;
        let call_started = Instant::now();
        let audio = match tts
            .synthesize(&pace_for_speech(&reply.text), self.voice.voice, self.services.speaking_rate)
            .await
        {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    unit = unit_no,
                    provider = %tts.id(),
                    outcome = %CompletionOutcome::from_error(&e),
                    latency_ms = call_started.elapsed().as_millis() as u64,
                    error = %e,
                    "Synthesis failed, replying with text only"
                );
                None
            }
        };

        self.session.append_exchange(transcript.clone(), reply.text.clone())?;

        info!(
            session_id = %session_id,
            unit = unit_no,
            style = %style,
            source = %reply.source,
            audio = audio.is_some(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Unit processed"
        );

        Ok(UnitReply {
            transcript,
            persona_text: reply.text,
            voice: self.voice,
            audio,
            style,
            source: reply.source,
        })
    }

    /// Handle the caller's end signal. Safe to call more than once.
    pub fn end(&mut self) -> SessionSummary {
        if self.session.complete() {
            info!(
                session_id = %self.session.id(),
                turns = self.session.turns().len(),
                "Session completed"
            );
        }
        self.session.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockSpeech, ScriptedProvider};
    use crate::backend::ChainTier;
    use crate::conversation::{simulate, VoiceId};
    use crate::persona::types::Demographics;
    use std::time::Duration;

    fn sarah() -> PersonaInput {
        PersonaInput {
            name: "Sarah Chen".into(),
            role: "Freelance Graphic Designer".into(),
            demographics: Demographics::Text("28, San Francisco".into()),
            pain_points: vec!["invoice tracking".into()],
            goals: vec!["Get paid faster".into()],
            personality_traits: vec!["Detail-oriented".into()],
            communication_style: Some("Friendly but professional".into()),
        }
    }

    fn services(speech: Arc<MockSpeech>, chain: CompletionChain) -> Arc<PipelineServices> {
        Arc::new(PipelineServices::new(chain, speech.clone(), speech))
    }

    fn audio(text: &str) -> InboundUnit {
        InboundUnit::Audio {
            bytes: text.as_bytes().to_vec(),
            encoding: AudioEncoding::Webm,
        }
    }

    #[test]
    fn test_invalid_persona_is_fatal() {
        let speech = Arc::new(MockSpeech::new());
        let input = PersonaInput {
            name: "  ".into(),
            role: "Designer".into(),
            ..Default::default()
        };
        let err = StreamingOrchestrator::new(services(speech, CompletionChain::default()), input)
            .err()
            .unwrap();
        assert!(matches!(err, Error::PersonaInvalid { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_transcription_failure_does_not_block_session() {
        let speech = Arc::new(MockSpeech::with_transcripts(vec![
            Some("Hi there"),
            Some("What's your biggest challenge?"),
            None,
            Some("How much would you pay?"),
            Some("Do you use any alternatives?"),
        ]));
        let mut orch =
            StreamingOrchestrator::new(services(speech.clone(), CompletionChain::default()), sarah()).unwrap();

        let mut results = Vec::new();
        for _ in 0..5 {
            results.push(orch.handle_unit(audio("ignored")).await);
        }

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(Error::Transcription { .. })));
        assert!(results[3].is_ok());
        assert!(results[4].is_ok());

        assert_eq!(orch.session().turns().len(), 8);
        assert_eq!(orch.status(), SessionStatus::Ongoing);

        orch.end();
        assert_eq!(orch.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_reply_uses_chain_and_simulator() {
        let speech = Arc::new(MockSpeech::new());
        let mut orch =
            StreamingOrchestrator::new(services(speech, CompletionChain::default()), sarah()).unwrap();

        let reply = orch
            .handle_unit(InboundUnit::Text("What's your biggest challenge?".into()))
            .await
            .unwrap();

        let persona = Persona::from_input(sarah()).unwrap();
        assert_eq!(reply.persona_text, simulate("What's your biggest challenge?", &persona));
        assert_eq!(reply.source, "simulator");
        assert!(reply.persona_text.contains("invoice tracking"));
    }

    #[tokio::test]
    async fn test_voice_and_paced_synthesis() {
        let speech = Arc::new(MockSpeech::new());
        let provider = Arc::new(ScriptedProvider::replying("groq", "It works but it is slow"));
        let chain = CompletionChain::new(vec![ChainTier {
            provider: provider.clone(),
            timeout: Duration::from_secs(1),
            temperature: 0.1,
            max_tokens: 100,
        }]);
        let mut orch = StreamingOrchestrator::new(services(speech.clone(), chain), sarah()).unwrap();

        let reply = orch.handle_unit(InboundUnit::Text("Is it fast?".into())).await.unwrap();

        assert_eq!(reply.voice.voice, VoiceId::Shimmer);
        assert_eq!(reply.persona_text, "It works but it is slow");
        assert_eq!(speech.last_text().as_deref(), Some("It works, but it is slow"));
        assert_eq!(reply.audio.as_deref(), Some(b"audio:shimmer".as_slice()));
    }

    #[tokio::test]
    async fn test_history_reaches_provider() {
        let speech = Arc::new(MockSpeech::new());
        let provider = Arc::new(ScriptedProvider::replying("groq", "Sure."));
        let chain = CompletionChain::new(vec![ChainTier {
            provider: provider.clone(),
            timeout: Duration::from_secs(1),
            temperature: 0.1,
            max_tokens: 100,
        }]);
        let mut orch = StreamingOrchestrator::new(services(speech, chain), sarah()).unwrap();

        orch.handle_unit(InboundUnit::Text("First question".into())).await.unwrap();
        orch.handle_unit(InboundUnit::Text("Second question".into())).await.unwrap();

        let request = provider.last_request().unwrap();
        assert!(request.turn_prompt.contains("Founder: First question"));
        assert!(request.turn_prompt.contains("Sarah Chen: Sure."));
        assert!(request.identity_prompt.contains("Freelance Graphic Designer"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_degrades_to_text() {
        let speech = Arc::new(MockSpeech::new().failing_synthesis());
        let mut orch =
            StreamingOrchestrator::new(services(speech, CompletionChain::default()), sarah()).unwrap();

        let reply = orch.handle_unit(InboundUnit::Text("Hello".into())).await.unwrap();

        assert!(reply.audio.is_none());
        assert!(!reply.persona_text.is_empty());
        assert_eq!(orch.session().turns().len(), 2);
    }

    #[tokio::test]
    async fn test_speech_timeouts_are_unit_scoped() {
        let speech = Arc::new(
            MockSpeech::with_transcripts(vec![None, Some("Hello")])
                .failing_synthesis()
                .timing_out(),
        );
        let mut orch =
            StreamingOrchestrator::new(services(speech.clone(), CompletionChain::default()), sarah()).unwrap();

        let err = orch.handle_unit(audio("x")).await.unwrap_err();
        assert!(matches!(err, Error::Transcription { timed_out: true, .. }));
        assert!(orch.session().turns().is_empty());

        let reply = orch.handle_unit(audio("x")).await.unwrap();
        assert_eq!(reply.transcript, "Hello");
        assert!(reply.audio.is_none());
        assert_eq!(speech.synthesize_calls(), 1);
        assert_eq!(orch.session().turns().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_units_append_nothing() {
        let speech = Arc::new(MockSpeech::with_transcripts(vec![Some("   ")]));
        let mut orch =
            StreamingOrchestrator::new(services(speech, CompletionChain::default()), sarah()).unwrap();

        assert!(orch.handle_unit(audio("x")).await.is_err());
        assert!(orch.handle_unit(InboundUnit::Text("".into())).await.is_err());
        assert!(orch.session().turns().is_empty());
        assert_eq!(orch.status(), SessionStatus::Ongoing);
    }

    #[tokio::test]
    async fn test_abandoned_unit_appends_nothing() {
        let speech = Arc::new(MockSpeech::new().with_transcribe_delay(Duration::from_secs(3600)));
        let mut orch =
            StreamingOrchestrator::new(services(speech, CompletionChain::default()), sarah()).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), orch.handle_unit(audio("hello"))).await;

        assert!(result.is_err());
        assert!(orch.session().turns().is_empty());
    }

    #[tokio::test]
    async fn test_units_after_end_are_rejected() {
        let speech = Arc::new(MockSpeech::new());
        let mut orch =
            StreamingOrchestrator::new(services(speech, CompletionChain::default()), sarah()).unwrap();

        orch.handle_unit(InboundUnit::Text("Hi".into())).await.unwrap();
        let summary = orch.end();
        assert_eq!(summary.turns, 2);

        let err = orch.handle_unit(InboundUnit::Text("Still there?".into())).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
        assert_eq!(orch.end().turns, 2);
    }
}
