//! Voice selection and speech pacing
//!
//! Maps persona traits onto a fixed set of synthesis voices, and prepares
//! reply text so synthesized speech pauses where a person would.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const FEMALE_NAMES: &[&str] = &[
    "sarah", "emma", "maria", "jennifer", "lisa", "anna", "kate", "amy", "rachel", "jessica",
];

const MALE_NAMES: &[&str] = &[
    "marcus", "john", "mike", "david", "alex", "chris", "james", "robert", "michael", "daniel",
];

/// Synthesis voices the text-to-speech gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceId {
    Shimmer,
    Nova,
    Alloy,
    Echo,
    Fable,
    Onyx,
    Coral,
}

impl VoiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceId::Shimmer => "shimmer",
            VoiceId::Nova => "nova",
            VoiceId::Alloy => "alloy",
            VoiceId::Echo => "echo",
            VoiceId::Fable => "fable",
            VoiceId::Onyx => "onyx",
            VoiceId::Coral => "coral",
        }
    }

    pub fn all() -> &'static [VoiceId] {
        &[
            VoiceId::Shimmer,
            VoiceId::Nova,
            VoiceId::Alloy,
            VoiceId::Echo,
            VoiceId::Fable,
            VoiceId::Onyx,
            VoiceId::Coral,
        ]
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoiceId::all()
            .iter()
            .copied()
            .find(|v| v.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown voice '{}'", s))
    }
}

/// Which resolution rule picked the voice. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceRule {
    FemaleProfessional,
    FemaleExpressive,
    FemaleBalanced,
    MaleTechnical,
    MaleCasual,
    MaleBalanced,
    CreativeStyle,
    Default,
}

impl VoiceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceRule::FemaleProfessional => "female_professional",
            VoiceRule::FemaleExpressive => "female_expressive",
            VoiceRule::FemaleBalanced => "female_balanced",
            VoiceRule::MaleTechnical => "male_technical",
            VoiceRule::MaleCasual => "male_casual",
            VoiceRule::MaleBalanced => "male_balanced",
            VoiceRule::CreativeStyle => "creative_style",
            VoiceRule::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    pub voice: VoiceId,
    pub rule: VoiceRule,
}

/// Pick a voice from the persona's name and communication style.
pub fn select_voice(name: &str, communication_style: &str) -> VoiceProfile {
    let style = communication_style.to_lowercase();
    let style_has = |words: &[&str]| words.iter().any(|w| style.contains(w));

    let (voice, rule) = if name_matches(name, FEMALE_NAMES) {
        if style_has(&["professional", "formal"]) {
            (VoiceId::Shimmer, VoiceRule::FemaleProfessional)
        } else if style_has(&["creative", "friendly"]) {
            (VoiceId::Nova, VoiceRule::FemaleExpressive)
        } else {
            (VoiceId::Alloy, VoiceRule::FemaleBalanced)
        }
    } else if name_matches(name, MALE_NAMES) {
        if style_has(&["technical", "analytical"]) {
            (VoiceId::Echo, VoiceRule::MaleTechnical)
        } else if style_has(&["casual", "friendly"]) {
            (VoiceId::Fable, VoiceRule::MaleCasual)
        } else {
            (VoiceId::Onyx, VoiceRule::MaleBalanced)
        }
    } else if style_has(&["creative", "artistic"]) {
        (VoiceId::Coral, VoiceRule::CreativeStyle)
    } else {
        (VoiceId::Nova, VoiceRule::Default)
    };

    VoiceProfile { voice, rule }
}

/// True when any word of `name` is in `list` (case-insensitive).
fn name_matches(name: &str, list: &[&str]) -> bool {
    name.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .any(|part| list.contains(&part))
}

// ─────────────────────────────────────────────────────────────────
// Speech pacing
// ─────────────────────────────────────────────────────────────────

/// Add pauses for text-to-speech: commas before conjunctions, ellipses
/// before hedges, and tidy stray double periods.
pub fn pace_for_speech(text: &str) -> String {
    let mut paced = text.trim().to_string();
    for conjunction in [" but ", " and ", " so ", " because "] {
        paced = insert_before(&paced, conjunction, ",");
    }
    for hedge in [" I mean", " I guess"] {
        paced = insert_before(&paced, hedge, "...");
    }
    normalize_periods(&paced)
}

/// Insert `mark` before each `needle` that directly follows a word.
fn insert_before(text: &str, needle: &str, mark: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for (idx, _) in text.match_indices(needle) {
        out.push_str(&text[last..idx]);
        if text[..idx].chars().last().is_some_and(|c| c.is_alphanumeric()) {
            out.push_str(mark);
        }
        last = idx;
    }
    out.push_str(&text[last..]);
    out
}

/// Collapse ".." to "." and runs of four or more dots to "...".
fn normalize_periods(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    let flush = |out: &mut String, run: usize| match run {
        0 => {}
        2 => out.push('.'),
        n if n >= 3 => out.push_str("..."),
        _ => out.push('.'),
    };

    for c in text.chars() {
        if c == '.' {
            run += 1;
        } else {
            flush(&mut out, run);
            run = 0;
            out.push(c);
        }
    }
    flush(&mut out, run);
    out
}
