//! Completion provider chain
//!
//! Tries each configured provider in a fixed order, one at a time, each under
//! its own timeout. Replies containing a refusal marker are discarded and the
//! chain moves on as if the tier had failed. When every tier is exhausted the
//! deterministic simulator answers, so `reply` always yields usable text.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ProviderSettings, ProvidersSettings};
use crate::conversation::{simulate, ComposedPrompt};
use crate::error::{Error, Result};
use crate::persona::Persona;

use super::{CompletionRequest, OpenAiProvider, SharedProvider};

/// Substrings (lowercase) that mark a completion as a policy refusal.
pub const REFUSAL_MARKERS: &[&str] = &[
    "cannot create",
    "cannot provide",
    "i cannot",
    "content policy",
    "inappropriate",
    "explicit content",
    "i cannot help",
    "against my programming",
];

/// Source label used when the simulator produced the reply.
pub const SIMULATOR_SOURCE: &str = "simulator";

// ─────────────────────────────────────────────────────────────────
// Policy filter
// ─────────────────────────────────────────────────────────────────

/// First refusal marker found in `text`, case-insensitive.
pub fn refusal_marker(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().copied().find(|m| lower.contains(m))
}

/// Pass `text` through unless it reads as a refusal.
pub fn policy_filter(provider: &str, text: String) -> Result<String> {
    match refusal_marker(&text) {
        Some(marker) => Err(Error::PolicyRejected {
            provider: provider.to_string(),
            marker: marker.to_string(),
        }),
        None => Ok(text),
    }
}

// ─────────────────────────────────────────────────────────────────
// Attempt records
// ─────────────────────────────────────────────────────────────────

/// How one tier ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Success,
    Unconfigured,
    Timeout,
    Error,
    PolicyRejected,
}

impl CompletionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionOutcome::Success => "success",
            CompletionOutcome::Unconfigured => "unconfigured",
            CompletionOutcome::Timeout => "timeout",
            CompletionOutcome::Error => "error",
            CompletionOutcome::PolicyRejected => "policy_rejected",
        }
    }

    /// Outcome of a call that returned `err`.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::ProviderUnconfigured { .. } => CompletionOutcome::Unconfigured,
            Error::PolicyRejected { .. } => CompletionOutcome::PolicyRejected,
            e if e.is_timeout() => CompletionOutcome::Timeout,
            _ => CompletionOutcome::Error,
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic record of one tier.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionAttempt {
    pub provider: String,
    pub outcome: CompletionOutcome,
    /// Reply text, present only on success
    pub text: Option<String>,
    pub latency: Duration,
}

/// Final chain result. `text` is never empty and never a refusal.
#[derive(Debug, Clone, Serialize)]
pub struct ChainReply {
    pub text: String,
    /// Provider id, or `simulator`
    pub source: String,
    pub attempts: Vec<CompletionAttempt>,
}

impl ChainReply {
    pub fn is_simulated(&self) -> bool {
        self.source == SIMULATOR_SOURCE
    }
}

// ─────────────────────────────────────────────────────────────────
// Chain
// ─────────────────────────────────────────────────────────────────

/// One provider plus the limits it is called with.
#[derive(Clone)]
pub struct ChainTier {
    pub provider: SharedProvider,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChainTier {
    pub fn new(provider: SharedProvider, settings: &ProviderSettings) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(settings.timeout_ms),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Ordered completion tiers followed by the simulator.
#[derive(Clone, Default)]
pub struct CompletionChain {
    tiers: Vec<ChainTier>,
}

impl CompletionChain {
    pub fn new(tiers: Vec<ChainTier>) -> Self {
        Self { tiers }
    }

    /// Primary then secondary, as OpenAI-compatible providers.
    pub fn from_settings(settings: &ProvidersSettings) -> Result<Self> {
        let mut tiers = Vec::with_capacity(2);
        for provider in [&settings.primary, &settings.secondary] {
            let client = OpenAiProvider::new(provider.clone())?;
            tiers.push(ChainTier::new(std::sync::Arc::new(client), provider));
        }
        Ok(Self::new(tiers))
    }

    pub fn tiers(&self) -> &[ChainTier] {
        &self.tiers
    }

    /// Tier ids in call order
    pub fn provider_ids(&self) -> Vec<String> {
        self.tiers.iter().map(|t| t.provider.id().to_string()).collect()
    }

    /// Produce exactly one reply for the founder's utterance.
    pub async fn reply(&self, prompt: &ComposedPrompt, utterance: &str, persona: &Persona) -> ChainReply {
        let mut attempts = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            let attempt = self.attempt(tier, prompt).await;
            let accepted = attempt.text.clone().map(|text| (text, attempt.provider.clone()));
            attempts.push(attempt);

            if let Some((text, source)) = accepted {
                return ChainReply {
                    text,
                    source,
                    attempts,
                };
            }
        }

        let text = simulate(utterance, persona);
        info!(
            provider = SIMULATOR_SOURCE,
            outcome = "success",
            latency_ms = 0u64,
            "Completion tiers exhausted, using simulator"
        );

        ChainReply {
            text,
            source: SIMULATOR_SOURCE.to_string(),
            attempts,
        }
    }

    async fn attempt(&self, tier: &ChainTier, prompt: &ComposedPrompt) -> CompletionAttempt {
        let provider = tier.provider.id().to_string();

        if !tier.provider.is_configured() {
            debug!(provider = %provider, outcome = "unconfigured", "Skipping completion tier");
            return CompletionAttempt {
                provider,
                outcome: CompletionOutcome::Unconfigured,
                text: None,
                latency: Duration::ZERO,
            };
        }

        let request = CompletionRequest {
            identity_prompt: prompt.identity.clone(),
            turn_prompt: prompt.turn.clone(),
            temperature: tier.temperature,
            max_tokens: tier.max_tokens,
        };

        let started = Instant::now();
        let result = tokio::time::timeout(tier.timeout, tier.provider.complete(&request)).await;
        let latency = started.elapsed();

        let (outcome, text) = match result {
            Err(_) => (CompletionOutcome::Timeout, None),
            Ok(Err(e)) => {
                let outcome = CompletionOutcome::from_error(&e);
                if outcome == CompletionOutcome::Error {
                    warn!(provider = %provider, error = %e, "Completion tier failed");
                }
                (outcome, None)
            }
            Ok(Ok(text)) if text.trim().is_empty() => (CompletionOutcome::Error, None),
            Ok(Ok(text)) => match policy_filter(&provider, text.trim().to_string()) {
                Ok(text) => (CompletionOutcome::Success, Some(text)),
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Completion discarded");
                    (CompletionOutcome::PolicyRejected, None)
                }
            },
        };

        let latency_ms = latency.as_millis() as u64;
        if outcome == CompletionOutcome::Success {
            info!(provider = %provider, outcome = %outcome, latency_ms, "Completion tier finished");
        } else {
            warn!(provider = %provider, outcome = %outcome, latency_ms, "Completion tier finished");
        }

        CompletionAttempt {
            provider,
            outcome,
            text,
            latency,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::ScriptedProvider;
    use crate::conversation::{classify, PromptComposer};
    use crate::persona::types::Demographics;
    use crate::persona::PersonaInput;
    use std::sync::Arc;

    fn persona() -> Persona {
        Persona::from_input(PersonaInput {
            name: "Sarah Chen".into(),
            role: "Freelance Graphic Designer".into(),
            demographics: Demographics::Text("28, San Francisco".into()),
            pain_points: vec!["invoice tracking".into()],
            goals: vec!["Get paid faster".into()],
            personality_traits: vec![],
            communication_style: None,
        })
        .unwrap()
    }

    fn tier(provider: ScriptedProvider, timeout_ms: u64) -> (Arc<ScriptedProvider>, ChainTier) {
        let provider = Arc::new(provider);
        let tier = ChainTier {
            provider: provider.clone(),
            timeout: Duration::from_millis(timeout_ms),
            temperature: 0.1,
            max_tokens: 100,
        };
        (provider, tier)
    }

    fn prompt(utterance: &str) -> ComposedPrompt {
        PromptComposer::default().compose(&persona(), &[], utterance, classify(utterance))
    }

    #[test]
    fn test_refusal_marker_case_insensitive() {
        assert_eq!(refusal_marker("Sorry, I CANNOT do that."), Some("i cannot"));
        assert_eq!(refusal_marker("That violates our Content Policy"), Some("content policy"));
        assert_eq!(refusal_marker("Invoices are a pain."), None);
    }

    #[test]
    fn test_policy_filter() {
        assert!(policy_filter("groq", "Sure, happy to talk.".into()).is_ok());
        let err = policy_filter("openai", "I cannot help with that".into()).unwrap_err();
        assert!(matches!(err, Error::PolicyRejected { ref provider, .. } if provider == "openai"));
    }

    #[tokio::test]
    async fn test_fallback_equivalence() {
        let utterance = "What's your biggest challenge?";
        let (_, first) = tier(ScriptedProvider::failing("groq"), 1_000);
        let (_, second) = tier(
            ScriptedProvider::replying("openai", "I cannot provide that kind of response."),
            1_000,
        );
        let chain = CompletionChain::new(vec![first, second]);

        let reply = chain.reply(&prompt(utterance), utterance, &persona()).await;

        assert_eq!(reply.text, simulate(utterance, &persona()));
        assert!(reply.is_simulated());
        let outcomes: Vec<_> = reply.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(outcomes, vec![CompletionOutcome::Error, CompletionOutcome::PolicyRejected]);
    }

    #[tokio::test]
    async fn test_refused_primary_falls_through_to_secondary() {
        let utterance = "What's your biggest challenge?";
        let (primary, first) = tier(ScriptedProvider::replying("groq", "I cannot help with that"), 1_000);
        let (secondary, second) = tier(ScriptedProvider::replying("openai", "Sure, what's up?"), 1_000);
        let chain = CompletionChain::new(vec![first, second]);

        let reply = chain.reply(&prompt(utterance), utterance, &persona()).await;

        assert_eq!(reply.text, "Sure, what's up?");
        assert_eq!(reply.source, "openai");
        assert!(!reply.is_simulated());
        let outcomes: Vec<_> = reply.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(outcomes, vec![CompletionOutcome::PolicyRejected, CompletionOutcome::Success]);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[test]
    fn test_outcome_from_error() {
        assert_eq!(
            CompletionOutcome::from_error(&Error::transcription_timeout("slow")),
            CompletionOutcome::Timeout
        );
        assert_eq!(
            CompletionOutcome::from_error(&Error::synthesis("bad voice")),
            CompletionOutcome::Error
        );
        assert_eq!(
            CompletionOutcome::from_error(&Error::ProviderUnconfigured { provider: "groq".into() }),
            CompletionOutcome::Unconfigured
        );
        assert_eq!(CompletionOutcome::from_error(&Error::synthesis_timeout("slow")).as_str(), "timeout");
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let (_, first) = tier(ScriptedProvider::replying("groq", "  Invoices, mostly.  "), 1_000);
        let (second_provider, second) = tier(ScriptedProvider::replying("openai", "unused"), 1_000);
        let chain = CompletionChain::new(vec![first, second]);

        let reply = chain.reply(&prompt("Hi"), "Hi", &persona()).await;

        assert_eq!(reply.text, "Invoices, mostly.");
        assert_eq!(reply.source, "groq");
        assert_eq!(reply.attempts.len(), 1);
        assert_eq!(second_provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_tier_is_skipped_not_called() {
        let (first_provider, first) = tier(ScriptedProvider::unconfigured("groq"), 1_000);
        let (_, second) = tier(ScriptedProvider::replying("openai", "Depends on the price."), 1_000);
        let chain = CompletionChain::new(vec![first, second]);

        let reply = chain.reply(&prompt("Would you pay?"), "Would you pay?", &persona()).await;

        assert_eq!(reply.text, "Depends on the price.");
        assert_eq!(reply.attempts[0].outcome, CompletionOutcome::Unconfigured);
        assert_eq!(first_provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout_advances_tier() {
        let (_, first) = tier(ScriptedProvider::hanging("groq"), 50);
        let (_, second) = tier(ScriptedProvider::replying("openai", "Not really."), 1_000);
        let chain = CompletionChain::new(vec![first, second]);

        let reply = chain.reply(&prompt("Is it hard?"), "Is it hard?", &persona()).await;

        assert_eq!(reply.attempts[0].outcome, CompletionOutcome::Timeout);
        assert_eq!(reply.text, "Not really.");
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let (_, first) = tier(ScriptedProvider::replying("groq", "   "), 1_000);
        let chain = CompletionChain::new(vec![first]);

        let reply = chain.reply(&prompt("Hello"), "Hello", &persona()).await;

        assert_eq!(reply.attempts[0].outcome, CompletionOutcome::Error);
        assert_eq!(reply.text, simulate("Hello", &persona()));
    }

    #[tokio::test]
    async fn test_empty_chain_uses_simulator() {
        let chain = CompletionChain::default();
        let reply = chain.reply(&prompt("Hello"), "Hello", &persona()).await;
        assert!(reply.is_simulated());
        assert!(reply.attempts.is_empty());
        assert!(!reply.text.is_empty());
    }

    #[tokio::test]
    async fn test_refusing_provider_called_once() {
        let (provider, first) = tier(ScriptedProvider::replying("groq", "Against my programming."), 1_000);
        let chain = CompletionChain::new(vec![first]);

        chain.reply(&prompt("Hello"), "Hello", &persona()).await;

        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_from_settings_order() {
        let chain = CompletionChain::from_settings(&ProvidersSettings::default()).unwrap();
        assert_eq!(chain.provider_ids(), vec!["groq", "openai"]);
        assert_eq!(chain.tiers()[0].timeout, Duration::from_millis(8_000));
        assert_eq!(chain.tiers()[1].max_tokens, 1500);
    }
}
