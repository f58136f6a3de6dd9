//! Persona registry: bundled sample personas plus user persona files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::types::{Persona, PersonaInput};

/// Sample personas compiled into the binary, keyed by slug.
const BUNDLED: &[(&str, &str)] = &[
    ("sarah-chen", include_str!("../../config/personas/sarah-chen.toml")),
    ("marcus-rivera", include_str!("../../config/personas/marcus-rivera.toml")),
    ("priya-nair", include_str!("../../config/personas/priya-nair.toml")),
];

/// Where a registered persona came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonaSource {
    Bundled,
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    id: String,
    persona: Arc<Persona>,
    source: PersonaSource,
}

/// Summary of an available persona.
#[derive(Debug, Clone)]
pub struct PersonaListing {
    pub id: String,
    pub name: String,
    pub role: String,
    pub source: PersonaSource,
}

/// Read-only lookup of personas by id, shared across sessions.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    entries: Vec<RegistryEntry>,
}

impl PersonaRegistry {
    /// Registry holding only the bundled personas.
    pub fn bundled() -> Result<Self> {
        let mut entries = Vec::with_capacity(BUNDLED.len());
        for (id, source) in BUNDLED {
            let input: PersonaInput = toml::from_str(source)
                .map_err(|e| Error::Internal(format!("Bundled persona '{}' is malformed: {}", id, e)))?;
            entries.push(RegistryEntry {
                id: (*id).to_string(),
                persona: Arc::new(Persona::from_input(input)?),
                source: PersonaSource::Bundled,
            });
        }
        Ok(Self { entries })
    }

    /// Bundled personas, plus a user directory when one is configured.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::with_directory(dir),
            None => Self::bundled(),
        }
    }

    /// Bundled personas plus every `.toml`/`.json` file in `dir`.
    ///
    /// Files that fail validation are skipped with a warning. A file whose
    /// slug matches an existing id replaces that entry.
    pub fn with_directory(dir: &Path) -> Result<Self> {
        let mut registry = Self::bundled()?;
        if !dir.exists() {
            debug!(path = %dir.display(), "Persona directory does not exist, using bundled personas");
            return Ok(registry);
        }

        let read_dir = std::fs::read_dir(dir).map_err(|e| Error::IoRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("toml" | "json")))
            .collect();
        paths.sort();

        for path in paths {
            match load_persona_file(&path) {
                Ok(persona) => {
                    let id = persona.slug();
                    info!(id = %id, path = %path.display(), "Loaded persona file");
                    registry.insert(id, persona, PersonaSource::File(path));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid persona file"),
            }
        }

        Ok(registry)
    }

    fn insert(&mut self, id: String, persona: Persona, source: PersonaSource) {
        let entry = RegistryEntry {
            id,
            persona: Arc::new(persona),
            source,
        };
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Look up a persona by id.
    pub fn get(&self, id: &str) -> Option<Arc<Persona>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.persona))
    }

    /// Resolve a CLI argument: an existing file path, otherwise a registry id.
    pub fn resolve(&self, id_or_path: &str) -> Result<Arc<Persona>> {
        let path = Path::new(id_or_path);
        if path.is_file() {
            return load_persona_file(path).map(Arc::new);
        }
        self.get(id_or_path).ok_or_else(|| Error::PersonaNotFound {
            id: id_or_path.to_string(),
        })
    }

    /// List all registered personas.
    pub fn list(&self) -> Vec<PersonaListing> {
        self.entries
            .iter()
            .map(|e| PersonaListing {
                id: e.id.clone(),
                name: e.persona.name().to_string(),
                role: e.persona.role().to_string(),
                source: e.source.clone(),
            })
            .collect()
    }
}

/// Load and validate a single persona file.
pub fn load_persona_file(path: &Path) -> Result<Persona> {
    Persona::from_input(PersonaInput::from_path(path)?)
}
