//! Question style classifier
//!
//! Tags a founder utterance as leading, vague, behavioral or neutral. Rules
//! live in an ordered table and the first matching rule wins.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phrases that presuppose the answer the founder wants to hear.
pub const LEADING_PHRASES: &[&str] = &[
    "don't you think",
    "wouldn't you",
    "isn't it true",
    "surely you",
    "obviously",
    "everyone knows",
    "it's clear that",
    "you must",
    "you probably",
    "wouldn't you agree",
    "don't you agree",
    "isn't it obvious",
    "clearly you",
];

/// Open prompts that ask about real past behavior.
pub const BEHAVIORAL_PHRASES: &[&str] = &[
    "tell me about",
    "walk me through",
    "describe",
    "explain",
    "what happened",
    "how do you",
    "what's your process",
    "can you share",
    "what works",
    "what doesn't work",
];

/// Opinion-seeking phrases that only count as vague in short utterances.
pub const VAGUE_PHRASES: &[&str] = &["what do you think", "how do you feel", "what's your opinion"];

/// Utterances with fewer words than this can be vague.
pub const VAGUE_MAX_WORDS: usize = 8;

/// Style of the latest founder utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStyle {
    Leading,
    VagueShort,
    GoodBehavioral,
    Neutral,
}

impl QuestionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStyle::Leading => "leading",
            QuestionStyle::VagueShort => "vague_short",
            QuestionStyle::GoodBehavioral => "good_behavioral",
            QuestionStyle::Neutral => "neutral",
        }
    }
}

impl fmt::Display for QuestionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Normalized utterance
// ─────────────────────────────────────────────────────────────────

/// Lowercased utterance with typographic apostrophes folded to ASCII.
#[derive(Debug, Clone)]
pub struct Utterance {
    lower: String,
    word_count: usize,
}

impl Utterance {
    pub fn new(text: &str) -> Self {
        let lower = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
        let word_count = lower.split_whitespace().count();
        Self { lower, word_count }
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn contains_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.lower.contains(p))
    }

    /// Whole-word match against single keywords, ignoring punctuation.
    pub fn has_word(&self, words: &[&str]) -> bool {
        self.lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .any(|w| words.contains(&w))
    }
}

// ─────────────────────────────────────────────────────────────────
// Rule table
// ─────────────────────────────────────────────────────────────────

/// One (predicate, label) row of the classification table.
pub struct StyleRule {
    pub style: QuestionStyle,
    pub matches: fn(&Utterance) -> bool,
}

fn is_leading(u: &Utterance) -> bool {
    u.contains_any(LEADING_PHRASES)
}

fn is_behavioral(u: &Utterance) -> bool {
    u.contains_any(BEHAVIORAL_PHRASES)
}

fn is_vague_short(u: &Utterance) -> bool {
    u.word_count() < VAGUE_MAX_WORDS && u.contains_any(VAGUE_PHRASES)
}

/// Evaluated top to bottom. Behavioral sits above vague so it always wins.
pub const STYLE_RULES: &[StyleRule] = &[
    StyleRule { style: QuestionStyle::Leading, matches: is_leading },
    StyleRule { style: QuestionStyle::GoodBehavioral, matches: is_behavioral },
    StyleRule { style: QuestionStyle::VagueShort, matches: is_vague_short },
];

/// Classify an utterance. Total and side-effect free; empty input is neutral.
pub fn classify(text: &str) -> QuestionStyle {
    classify_utterance(&Utterance::new(text))
}

pub fn classify_utterance(utterance: &Utterance) -> QuestionStyle {
    STYLE_RULES
        .iter()
        .find(|rule| (rule.matches)(utterance))
        .map(|rule| rule.style)
        .unwrap_or(QuestionStyle::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_wins_over_everything() {
        assert_eq!(classify("Don't you think this is great?"), QuestionStyle::Leading);
        assert_eq!(
            classify("Don't you think you could tell me about your process and describe it?"),
            QuestionStyle::Leading
        );
    }

    #[test]
    fn test_behavioral_overrides_vague_even_when_short() {
        assert_eq!(
            classify("Tell me about your biggest challenge"),
            QuestionStyle::GoodBehavioral
        );
        assert_eq!(classify("What do you think? Describe it."), QuestionStyle::GoodBehavioral);
    }

    #[test]
    fn test_vague_requires_short_utterance() {
        assert_eq!(classify("What do you think?"), QuestionStyle::VagueShort);
        assert_eq!(
            classify("What do you think about the way invoices get chased every single month?"),
            QuestionStyle::Neutral
        );
    }

    #[test]
    fn test_seven_words_still_vague_eight_not() {
        assert_eq!(classify("so what do you think of it"), QuestionStyle::VagueShort);
        assert_eq!(classify("so what do you think of it now"), QuestionStyle::Neutral);
    }

    #[test]
    fn test_empty_and_plain_input_are_neutral() {
        assert_eq!(classify(""), QuestionStyle::Neutral);
        assert_eq!(classify("   "), QuestionStyle::Neutral);
        assert_eq!(classify("Would you pay for a tool that solved this?"), QuestionStyle::Neutral);
    }

    #[test]
    fn test_case_and_curly_apostrophes() {
        assert_eq!(classify("DON\u{2019}T YOU THINK so?"), QuestionStyle::Leading);
        assert_eq!(classify("What\u{2019}s your opinion?"), QuestionStyle::VagueShort);
    }

    #[test]
    fn test_rule_table_order() {
        let order: Vec<_> = STYLE_RULES.iter().map(|r| r.style).collect();
        assert_eq!(
            order,
            vec![
                QuestionStyle::Leading,
                QuestionStyle::GoodBehavioral,
                QuestionStyle::VagueShort
            ]
        );
    }

    #[test]
    fn test_has_word_is_whole_word() {
        let u = Utterance::new("This is a thing, hi!");
        assert!(u.has_word(&["hi"]));
        assert!(!Utterance::new("this thing").has_word(&["hi"]));
    }

    #[test]
    fn test_serialized_labels() {
        assert_eq!(
            serde_json::to_string(&QuestionStyle::VagueShort).unwrap(),
            "\"vague_short\""
        );
        assert_eq!(QuestionStyle::GoodBehavioral.to_string(), "good_behavioral");
    }
}
