//! OpenAI-compatible API clients
//!
//! `OpenAiProvider` speaks the chat-completions protocol shared by OpenAI,
//! Groq and most hosted gateways. `OpenAiSpeech` covers the Whisper
//! transcription and `/audio/speech` synthesis endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ProviderSettings, SpeechSettings};
use crate::conversation::VoiceId;
use crate::error::{Error, Result};

use super::{AudioEncoding, CompletionProvider, CompletionRequest, SpeechToText, TextToSpeech};

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'static str,
    response_format: &'a str,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

fn build_client(timeout_ms: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(crate::version::user_agent())
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
}

fn with_auth(req: RequestBuilder, api_key: &str) -> RequestBuilder {
    if api_key.is_empty() {
        req
    } else {
        req.bearer_auth(api_key)
    }
}

/// Turn a non-2xx response into an error message carrying the body.
async fn error_body(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("API error {}: {}", status, body.trim())
}

// ─────────────────────────────────────────────────────────────────
// Completion provider
// ─────────────────────────────────────────────────────────────────

/// Chat-completion provider for any OpenAI-compatible endpoint
pub struct OpenAiProvider {
    settings: ProviderSettings,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = build_client(settings.timeout_ms)?;

        info!(
            provider = %settings.id,
            base_url = %settings.base_url,
            model = %settings.model,
            configured = settings.is_configured(),
            "Completion provider created"
        );

        Ok(Self { settings, client })
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout {
                provider: self.settings.id.clone(),
                timeout_ms: self.settings.timeout_ms,
            }
        } else {
            Error::provider_failed(&self.settings.id, format!("Request error: {}", e))
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.settings.id
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if !self.is_configured() {
            return Err(Error::ProviderUnconfigured {
                provider: self.settings.id.clone(),
            });
        }

        let body = ChatCompletionRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.identity_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.turn_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let response = with_auth(self.client.post(&url).json(&body), &self.settings.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Error::provider_failed(&self.settings.id, error_body(response).await));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                Error::provider_failed(&self.settings.id, format!("Failed to parse API response: {}", e))
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_failed(&self.settings.id, "No choices in API response"))?
            .message
            .content
            .unwrap_or_default();

        debug!(provider = %self.settings.id, chars = text.len(), "Completion received");

        Ok(text)
    }
}

// ─────────────────────────────────────────────────────────────────
// Speech gateway
// ─────────────────────────────────────────────────────────────────

const SPEECH_GATEWAY_ID: &str = "openai-speech";

/// Whisper transcription and TTS over an OpenAI-compatible API
pub struct OpenAiSpeech {
    settings: SpeechSettings,
    client: Client,
}

impl OpenAiSpeech {
    pub fn new(settings: SpeechSettings) -> Result<Self> {
        let client = build_client(settings.timeout_ms)?;
        Ok(Self { settings, client })
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl SpeechToText for OpenAiSpeech {
    fn id(&self) -> &str {
        SPEECH_GATEWAY_ID
    }

    async fn transcribe(&self, audio: &[u8], encoding: AudioEncoding) -> Result<String> {
        if !self.is_configured() {
            return Err(Error::transcription("Speech gateway is not configured"));
        }
        if audio.is_empty() {
            return Err(Error::transcription("Empty audio payload"));
        }

        let file = Part::bytes(audio.to_vec())
            .file_name(format!("audio.{}", encoding.extension()))
            .mime_str(encoding.mime_type())
            .map_err(|e| Error::transcription(format!("Invalid audio part: {}", e)))?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.settings.stt_model.clone());

        let response = with_auth(
            self.client.post(self.endpoint("audio/transcriptions")).multipart(form),
            &self.settings.api_key,
        )
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::transcription_timeout(format!("No response within {}ms", self.settings.timeout_ms))
            } else {
                Error::transcription(format!("Request error: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(Error::transcription(error_body(response).await));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::transcription(format!("Failed to parse transcription: {}", e)))?;

        Ok(parsed.text)
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeech {
    fn id(&self) -> &str {
        SPEECH_GATEWAY_ID
    }

    async fn synthesize(&self, text: &str, voice: VoiceId, speaking_rate: f32) -> Result<Vec<u8>> {
        if !self.is_configured() {
            return Err(Error::synthesis("Speech gateway is not configured"));
        }

        let body = SpeechRequest {
            model: &self.settings.tts_model,
            input: text,
            voice: voice.as_str(),
            response_format: &self.settings.audio_format,
            speed: speaking_rate,
        };

        let response = with_auth(
            self.client.post(self.endpoint("audio/speech")).json(&body),
            &self.settings.api_key,
        )
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::synthesis_timeout(format!("No response within {}ms", self.settings.timeout_ms))
            } else {
                Error::synthesis(format!("Request error: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(Error::synthesis(error_body(response).await));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::synthesis(format!("Failed to read audio: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
