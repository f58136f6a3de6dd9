//! Deterministic offline persona simulator
//!
//! Last-resort reply generator used when every completion provider is
//! unavailable. Network-free and pure: the same utterance and persona always
//! produce the same reply, across runs and platforms.
//!
//! Template selection hashes the raw utterance bytes with SHA-256, reads the
//! first eight digest bytes as a big-endian `u64` and takes it modulo the
//! bucket's template count.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::persona::Persona;

use super::classifier::{classify_utterance, QuestionStyle, Utterance, LEADING_PHRASES};

/// Substituted when a persona has no pain points.
const DEFAULT_PAIN: &str = "the usual admin stuff";

/// Substituted when a persona has no goals.
const DEFAULT_GOAL: &str = "getting more done with less";

// ─────────────────────────────────────────────────────────────────
// Topic buckets
// ─────────────────────────────────────────────────────────────────

/// Topic of an utterance, as far as the simulator cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicBucket {
    Greeting,
    LeadingPushback,
    VagueClarify,
    PainOrProblem,
    SolutionOrProduct,
    Pricing,
    TimeOrEfficiency,
    Competition,
    Default,
}

impl TopicBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicBucket::Greeting => "greeting",
            TopicBucket::LeadingPushback => "leading_pushback",
            TopicBucket::VagueClarify => "vague_clarify",
            TopicBucket::PainOrProblem => "pain_or_problem",
            TopicBucket::SolutionOrProduct => "solution_or_product",
            TopicBucket::Pricing => "pricing",
            TopicBucket::TimeOrEfficiency => "time_or_efficiency",
            TopicBucket::Competition => "competition",
            TopicBucket::Default => "default",
        }
    }

    /// Reply templates owned by this bucket.
    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            TopicBucket::Greeting => &[
                "Hi. I'm {name}. What's this about?",
                "Hey there. So what did you want to discuss?",
                "Hi. I don't have too much time, but what's up?",
                "Hello. You mentioned something about a startup idea?",
            ],
            TopicBucket::LeadingPushback => &[
                "I mean, I'm not sure about that...",
                "Not necessarily, no.",
                "I guess it depends.",
                "That's not really how I see it.",
                "I'd need to know more specifics.",
            ],
            TopicBucket::VagueClarify => &[
                "About what specifically?",
                "I mean, it's fine I guess.",
                "Can you be more specific?",
                "It depends on what you mean.",
                "I don't really have strong opinions on that.",
            ],
            TopicBucket::PainOrProblem => &[
                "As a {role}? Yeah, {pain} is the big one for me. Why do you ask?",
                "I mean, {pain} eats a lot of my week as a {role}. What about it?",
                "Honestly, {pain}. That's the part of being a {role} nobody warns you about. Are you trying to solve that or something?",
                "I guess {pain} comes up a lot when you're a {role}. What's your angle?",
            ],
            TopicBucket::SolutionOrProduct => &[
                "Okay... what does it do exactly?",
                "I've heard that before. How is this different?",
                "Sounds like a lot of other things out there.",
                "What makes you think people need this?",
                "I mean, maybe. Depends on how it works.",
            ],
            TopicBucket::Pricing => &[
                "Depends what I'm getting for it.",
                "I'm not looking to spend money on random stuff.",
                "Price matters, but so does value. What's the value?",
                "I'd need to see if it's worth it first.",
                "How much are we talking?",
            ],
            TopicBucket::TimeOrEfficiency => &[
                "Time is definitely important. My main goal right now: {goal}. How much time are we talking?",
                "I mean, faster is better I guess. But how?",
                "Sure, I don't like wasting time. What's your point?",
                "Efficiency is good, but I've heard promises before.",
                "Okay, but how do you actually make things faster?",
            ],
            TopicBucket::Competition => &[
                "Yeah, I use a few different tools already.",
                "There are options out there. What makes yours special?",
                "I've got my current setup. Why would I switch?",
                "Sure, there are alternatives. So what?",
                "I mean, the market's pretty crowded already.",
            ],
            TopicBucket::Default => &[
                "I'm not sure I follow. Can you explain?",
                "Okay... and?",
                "I guess. What's your point?",
                "That's interesting I suppose. Where are you going with this?",
                "I mean, maybe. I'd need to understand more.",
                "Not sure about that. Can you be more specific?",
                "I don't really know enough to say.",
            ],
        }
    }
}

impl fmt::Display for TopicBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (predicate, bucket) row of the topic table.
pub struct BucketRule {
    pub bucket: TopicBucket,
    pub matches: fn(&Utterance) -> bool,
}

fn is_greeting(u: &Utterance) -> bool {
    u.has_word(&["hello", "hi", "hey", "hiya"]) || u.contains_any(&["good morning", "good afternoon"])
}

fn is_leading(u: &Utterance) -> bool {
    u.contains_any(LEADING_PHRASES)
}

fn is_vague(u: &Utterance) -> bool {
    classify_utterance(u) == QuestionStyle::VagueShort
}

fn is_pain(u: &Utterance) -> bool {
    u.has_word(&[
        "problem", "problems", "challenge", "challenges", "challenging", "pain", "painful",
        "frustration", "frustrating", "struggle", "struggles", "annoying",
    ])
}

fn is_solution(u: &Utterance) -> bool {
    u.has_word(&[
        "solution", "solutions", "product", "products", "feature", "features", "app", "apps",
        "platform", "platforms",
    ])
}

fn is_pricing(u: &Utterance) -> bool {
    u.has_word(&[
        "price", "prices", "pricing", "cost", "costs", "pay", "paying", "money", "expensive",
        "budget",
    ])
}

fn is_time(u: &Utterance) -> bool {
    u.has_word(&[
        "time", "fast", "faster", "quick", "quickly", "speed", "efficient", "efficiency",
    ])
}

fn is_competition(u: &Utterance) -> bool {
    u.has_word(&[
        "competitor", "competitors", "competition", "alternative", "alternatives", "existing",
        "current", "currently",
    ])
}

/// Evaluated top to bottom; first match wins, otherwise `Default`.
pub const BUCKET_RULES: &[BucketRule] = &[
    BucketRule { bucket: TopicBucket::Greeting, matches: is_greeting },
    BucketRule { bucket: TopicBucket::LeadingPushback, matches: is_leading },
    BucketRule { bucket: TopicBucket::VagueClarify, matches: is_vague },
    BucketRule { bucket: TopicBucket::PainOrProblem, matches: is_pain },
    BucketRule { bucket: TopicBucket::SolutionOrProduct, matches: is_solution },
    BucketRule { bucket: TopicBucket::Pricing, matches: is_pricing },
    BucketRule { bucket: TopicBucket::TimeOrEfficiency, matches: is_time },
    BucketRule { bucket: TopicBucket::Competition, matches: is_competition },
];

/// Pick the topic bucket for an utterance.
pub fn bucket_for(text: &str) -> TopicBucket {
    let utterance = Utterance::new(text);
    BUCKET_RULES
        .iter()
        .find(|rule| (rule.matches)(&utterance))
        .map(|rule| rule.bucket)
        .unwrap_or(TopicBucket::Default)
}

// ─────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────

/// Simulated reply together with how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedReply {
    pub bucket: TopicBucket,
    pub template_index: usize,
    pub text: String,
}

/// Stable 64-bit hash of the utterance text.
pub fn stable_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Generate the offline reply for an utterance.
pub fn simulate(utterance: &str, persona: &Persona) -> String {
    simulate_explained(utterance, persona).text
}

/// Like [`simulate`], also reporting the bucket and template chosen.
pub fn simulate_explained(utterance: &str, persona: &Persona) -> SimulatedReply {
    let bucket = bucket_for(utterance);
    let templates = bucket.templates();
    let template_index = (stable_hash(utterance) % templates.len() as u64) as usize;

    SimulatedReply {
        bucket,
        template_index,
        text: render(templates[template_index], persona),
    }
}

/// Single-pass `{field}` substitution, so persona text is never re-expanded.
fn render(template: &str, persona: &Persona) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('}') else {
            out.push_str(after);
            return out;
        };

        match &after[1..end] {
            "name" => out.push_str(persona.name()),
            "role" => out.push_str(persona.role()),
            "pain" => out.push_str(persona.first_pain_point().unwrap_or(DEFAULT_PAIN)),
            "goal" => out.push_str(persona.first_goal().unwrap_or(DEFAULT_GOAL)),
            _ => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::Demographics;
    use crate::persona::PersonaInput;

    fn persona(pain_points: &[&str], goals: &[&str]) -> Persona {
        Persona::from_input(PersonaInput {
            name: "Sarah Chen".into(),
            role: "Freelance Graphic Designer".into(),
            demographics: Demographics::Text("28, San Francisco".into()),
            pain_points: pain_points.iter().map(|s| s.to_string()).collect(),
            goals: goals.iter().map(|s| s.to_string()).collect(),
            personality_traits: vec![],
            communication_style: None,
        })
        .unwrap()
    }

    #[test]
    fn test_simulate_is_deterministic() {
        let p = persona(&["invoice tracking"], &["Get paid faster"]);
        for text in ["Hello!", "What's your biggest challenge?", "How much would you pay?", ""] {
            assert_eq!(simulate(text, &p), simulate(text, &p));
        }
    }

    #[test]
    fn test_stable_hash_known_value() {
        // First 8 bytes of SHA-256("") = e3b0c44298fc1c14
        assert_eq!(stable_hash(""), 0xe3b0_c442_98fc_1c14);
    }

    #[test]
    fn test_pain_scenario_mentions_pain_point_and_role() {
        let p = persona(&["invoice tracking"], &[]);
        let reply = simulate_explained("What's your biggest challenge?", &p);

        assert_eq!(reply.bucket, TopicBucket::PainOrProblem);
        assert!(reply.text.contains("invoice tracking"), "{}", reply.text);
        assert!(reply.text.contains("Freelance Graphic Designer"), "{}", reply.text);
    }

    #[test]
    fn test_every_pain_template_mentions_pain_and_role() {
        let p = persona(&["invoice tracking"], &[]);
        for template in TopicBucket::PainOrProblem.templates() {
            let text = render(template, &p);
            assert!(text.contains("invoice tracking"));
            assert!(text.contains(p.role()));
        }
    }

    #[test]
    fn test_bucket_priority() {
        assert_eq!(bucket_for("Hi, what's your biggest problem?"), TopicBucket::Greeting);
        assert_eq!(bucket_for("Don't you think the price is fair?"), TopicBucket::LeadingPushback);
        assert_eq!(bucket_for("What do you think?"), TopicBucket::VagueClarify);
        assert_eq!(bucket_for("Is pricing a problem?"), TopicBucket::PainOrProblem);
        assert_eq!(bucket_for("Would an app cost too much?"), TopicBucket::SolutionOrProduct);
        assert_eq!(bucket_for("Would you pay for this?"), TopicBucket::Pricing);
        assert_eq!(bucket_for("Does it take a lot of time?"), TopicBucket::TimeOrEfficiency);
        assert_eq!(
            bucket_for("How do you currently handle invoicing?"),
            TopicBucket::Competition
        );
        assert_eq!(bucket_for("Interesting."), TopicBucket::Default);
    }

    #[test]
    fn test_greeting_is_whole_word() {
        assert_ne!(bucket_for("Is this something you think about?"), TopicBucket::Greeting);
    }

    #[test]
    fn test_bucket_rule_order_matches_priority() {
        let order: Vec<_> = BUCKET_RULES.iter().map(|r| r.bucket).collect();
        assert_eq!(
            order,
            vec![
                TopicBucket::Greeting,
                TopicBucket::LeadingPushback,
                TopicBucket::VagueClarify,
                TopicBucket::PainOrProblem,
                TopicBucket::SolutionOrProduct,
                TopicBucket::Pricing,
                TopicBucket::TimeOrEfficiency,
                TopicBucket::Competition,
            ]
        );
    }

    #[test]
    fn test_template_index_in_range() {
        let p = persona(&[], &[]);
        for text in ["hi", "hey there", "what do you think", "money", "fast", "random words"] {
            let reply = simulate_explained(text, &p);
            assert!(reply.template_index < reply.bucket.templates().len());
            assert!(!reply.text.is_empty());
        }
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let p = persona(&[], &[]);
        let text = render("{pain} / {goal} / {name}", &p);
        assert_eq!(text, "the usual admin stuff / getting more done with less / Sarah Chen");
    }

    #[test]
    fn test_render_does_not_reexpand_persona_text() {
        let p = persona(&["{goal}"], &["ship it"]);
        assert_eq!(render("{pain}", &p), "{goal}");
        assert_eq!(render("unknown {field} and {", &p), "unknown {field} and {");
    }
}
