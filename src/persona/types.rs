//! Core types for synthetic customer personas.
//!
//! A persona arrives loosely typed (`PersonaInput`, where demographics may be
//! a string or an object) and is normalized exactly once into the immutable
//! `Persona` that a session owns for its whole lifetime.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Input Types
// ─────────────────────────────────────────────────────────────────

/// Demographics as supplied by callers: free text or a key/value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Demographics {
    /// Already a single descriptive string.
    Text(String),
    /// Structured fields, flattened as `key: value` pairs in insertion order.
    Fields(Map<String, Value>),
}

impl Demographics {
    /// Canonical single-string representation.
    pub fn flatten(&self) -> String {
        match self {
            Demographics::Text(text) => text.trim().to_string(),
            Demographics::Fields(fields) => fields
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => format!("{}: {}", key, s),
                    other => format!("{}: {}", key, other),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl Default for Demographics {
    fn default() -> Self {
        Demographics::Text(String::new())
    }
}

/// Raw persona definition, deserialized from JSON or TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaInput {
    pub name: String,

    pub role: String,

    #[serde(default)]
    pub demographics: Demographics,

    #[serde(default)]
    pub pain_points: Vec<String>,

    #[serde(default)]
    pub goals: Vec<String>,

    #[serde(default)]
    pub personality_traits: Vec<String>,

    #[serde(default)]
    pub communication_style: Option<String>,
}

impl PersonaInput {
    /// Parse a persona file, picking the format from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let label = path.display().to_string();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content)
                .map_err(|e| Error::persona_invalid(label, e.to_string())),
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::persona_invalid(label, e.to_string())),
            other => Err(Error::persona_invalid(
                label,
                format!("unsupported persona file extension {:?}", other.unwrap_or("")),
            )),
        }
    }

    /// Parse a persona from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// Validated persona. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    name: String,
    role: String,
    demographics: String,
    pain_points: Vec<String>,
    goals: Vec<String>,
    personality_traits: Vec<String>,
    communication_style: Option<String>,
}

impl Persona {
    /// Normalize and validate a raw persona definition.
    ///
    /// Rejects empty names and roles. Blank list entries are dropped and a
    /// blank communication style becomes `None`.
    pub fn from_input(input: PersonaInput) -> Result<Self> {
        let name = input.name.trim().to_string();
        let role = input.role.trim().to_string();

        if name.is_empty() {
            return Err(Error::persona_invalid(name, "name must not be empty"));
        }
        if role.is_empty() {
            return Err(Error::persona_invalid(name, "role must not be empty"));
        }

        Ok(Self {
            demographics: input.demographics.flatten(),
            pain_points: clean_list(input.pain_points),
            goals: clean_list(input.goals),
            personality_traits: clean_list(input.personality_traits),
            communication_style: input
                .communication_style
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            name,
            role,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn demographics(&self) -> &str {
        &self.demographics
    }

    pub fn pain_points(&self) -> &[String] {
        &self.pain_points
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn personality_traits(&self) -> &[String] {
        &self.personality_traits
    }

    pub fn communication_style(&self) -> Option<&str> {
        self.communication_style.as_deref()
    }

    pub fn first_pain_point(&self) -> Option<&str> {
        self.pain_points.first().map(String::as_str)
    }

    pub fn first_goal(&self) -> Option<&str> {
        self.goals.first().map(String::as_str)
    }

    /// Registry slug derived from the name ("Sarah Chen" -> "sarah-chen").
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

impl TryFrom<PersonaInput> for Persona {
    type Error = Error;

    fn try_from(input: PersonaInput) -> Result<Self> {
        Persona::from_input(input)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercase, alphanumeric runs joined by single hyphens.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
