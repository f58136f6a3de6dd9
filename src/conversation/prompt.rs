//! Prompt composition for completion providers
//!
//! Two artifacts per turn: the identity prompt (who the persona is and how
//! they behave) and the turn prompt (recent history, the new utterance and a
//! style directive). Both are pure functions of their inputs.

use crate::persona::Persona;

use super::classifier::QuestionStyle;
use super::turn::{ConversationTurn, Speaker};

/// Default number of trailing turns shown to the provider.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

const LEADING_DIRECTIVE: &str =
    "The founder asked a leading question. Be skeptical and push back. Don't just agree.";
const VAGUE_DIRECTIVE: &str =
    "The founder asked a vague question. Give a short, non-committal answer or ask for specifics.";
const NEUTRAL_DIRECTIVE: &str =
    "The founder asked a reasonable question. You can engage normally but still be naturally cautious.";

/// Identity and turn prompts for one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub identity: String,
    pub turn: String,
    pub style: QuestionStyle,
}

/// Builds prompts with a fixed trailing history window.
#[derive(Debug, Clone, Copy)]
pub struct PromptComposer {
    history_window: usize,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptComposer {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn compose(
        &self,
        persona: &Persona,
        history: &[ConversationTurn],
        utterance: &str,
        style: QuestionStyle,
    ) -> ComposedPrompt {
        ComposedPrompt {
            identity: identity_prompt(persona),
            turn: turn_prompt(persona, self.window(history), utterance, style),
            style,
        }
    }

    /// The trailing `history_window` turns, oldest first.
    pub fn window<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        let start = history.len().saturating_sub(self.history_window);
        &history[start..]
    }
}

/// Directive matching the classified question style.
pub fn style_directive(style: QuestionStyle) -> &'static str {
    match style {
        QuestionStyle::Leading => LEADING_DIRECTIVE,
        QuestionStyle::VagueShort => VAGUE_DIRECTIVE,
        QuestionStyle::GoodBehavioral | QuestionStyle::Neutral => NEUTRAL_DIRECTIVE,
    }
}

/// System prompt establishing the persona and its behavioral constraints.
pub fn identity_prompt(persona: &Persona) -> String {
    let demographics = if persona.demographics().is_empty() {
        "someone with a busy working life".to_string()
    } else {
        persona.demographics().to_string()
    };

    format!(
        r#"You are {name}, a {role}. You are NOT an AI assistant.

CRITICAL: You are a REAL PERSON being interviewed. Act naturally skeptical, busy, and human.

Your personality:
- You're {demographics}
- You have limited time and aren't eager to help random founders
- You're naturally skeptical of new solutions
- You deflect vague or leading questions
- You share specific examples only when they ask specific, behavioral questions

Pain points you deal with: {pains}
Your goals: {goals}
Personality traits: {traits}

RESPONSE RULES:
- Keep responses to 1-2 sentences MAX
- Be naturally skeptical and don't volunteer information easily
- If asked vague questions, give vague answers or ask for clarification
- If asked leading questions, push back or deflect
- Only share detailed insights if they ask specific questions about what you actually do
- NEVER include stage directions like *sigh*, (pauses), or emotional descriptions
- Speak naturally without narrating your actions or emotions"#,
        name = persona.name(),
        role = persona.role(),
        demographics = demographics,
        pains = persona.pain_points().join(", "),
        goals = persona.goals().join(", "),
        traits = persona.personality_traits().join(", "),
    )
}

/// User prompt for a single turn. `history` is already windowed.
pub fn turn_prompt(
    persona: &Persona,
    history: &[ConversationTurn],
    utterance: &str,
    style: QuestionStyle,
) -> String {
    let context = history
        .iter()
        .map(|turn| {
            let speaker = match turn.speaker {
                Speaker::Founder => "Founder",
                Speaker::Persona => persona.name(),
            };
            format!("{}: {}", speaker, turn.message)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Conversation so far:
{context}

Founder just said: "{utterance}"

{directive}

Respond as {name} would ACTUALLY respond in real life. Keep it short and natural.

Your response:"#,
        context = context,
        utterance = utterance.trim(),
        directive = style_directive(style),
        name = persona.name(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::Demographics;
    use crate::persona::PersonaInput;

    fn persona() -> Persona {
        Persona::from_input(PersonaInput {
            name: "Sarah Chen".into(),
            role: "Freelance Graphic Designer".into(),
            demographics: Demographics::Text("28, San Francisco".into()),
            pain_points: vec!["Manual invoice tracking".into(), "Client follow-ups".into()],
            goals: vec!["Streamline workflow".into()],
            personality_traits: vec!["Detail-oriented".into(), "Creative".into()],
            communication_style: None,
        })
        .unwrap()
    }

    fn history(n: usize) -> Vec<ConversationTurn> {
        (0..n)
            .map(|i| {
                let speaker = if i % 2 == 0 { Speaker::Founder } else { Speaker::Persona };
                ConversationTurn::new(speaker, format!("message {}", i), i)
            })
            .collect()
    }

    #[test]
    fn test_identity_prompt_contents() {
        let prompt = identity_prompt(&persona());
        assert!(prompt.contains("You are Sarah Chen, a Freelance Graphic Designer"));
        assert!(prompt.contains("28, San Francisco"));
        assert!(prompt.contains("Pain points you deal with: Manual invoice tracking, Client follow-ups"));
        assert!(prompt.contains("Your goals: Streamline workflow"));
        assert!(prompt.contains("Personality traits: Detail-oriented, Creative"));
        assert!(prompt.contains("1-2 sentences"));
        assert!(prompt.contains("stage directions"));
    }

    #[test]
    fn test_window_keeps_last_six() {
        let composer = PromptComposer::default();
        let turns = history(9);
        let window = composer.window(&turns);

        assert_eq!(window.len(), 6);
        assert_eq!(window[0].message, "message 3");
        assert_eq!(window[5].message, "message 8");
    }

    #[test]
    fn test_window_shorter_history() {
        let composer = PromptComposer::default();
        let turns = history(2);
        assert_eq!(composer.window(&turns).len(), 2);
        assert!(composer.window(&[]).is_empty());
    }

    #[test]
    fn test_turn_prompt_drops_oldest_turns() {
        let composer = PromptComposer::new(2);
        let prompt = composer.compose(&persona(), &history(4), "Why?", QuestionStyle::Neutral);

        assert!(!prompt.turn.contains("message 1"));
        assert!(prompt.turn.contains("Founder: message 2"));
        assert!(prompt.turn.contains("Sarah Chen: message 3"));
        assert!(prompt.turn.contains("Founder just said: \"Why?\""));
    }

    #[test]
    fn test_directive_per_style() {
        let p = persona();
        let leading = turn_prompt(&p, &[], "x", QuestionStyle::Leading);
        let vague = turn_prompt(&p, &[], "x", QuestionStyle::VagueShort);
        let behavioral = turn_prompt(&p, &[], "x", QuestionStyle::GoodBehavioral);
        let neutral = turn_prompt(&p, &[], "x", QuestionStyle::Neutral);

        assert!(leading.contains("push back"));
        assert!(vague.contains("ask for specifics"));
        assert!(behavioral.contains("engage normally"));
        assert_eq!(behavioral, neutral);
    }

    #[test]
    fn test_compose_is_pure() {
        let composer = PromptComposer::default();
        let turns = history(3);
        let a = composer.compose(&persona(), &turns, "Tell me more", QuestionStyle::GoodBehavioral);
        let b = composer.compose(&persona(), &turns, "Tell me more", QuestionStyle::GoodBehavioral);
        assert_eq!(a, b);
    }
}
