//! Configuration system for the persona service
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (STEPONE_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values
//!
//! The loaded value is immutable once built. Pipeline components receive the
//! pieces they need at construction and never read the environment themselves.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default speaking rate for synthesized replies (slightly slower than normal)
pub const DEFAULT_SPEAKING_RATE: f32 = 0.95;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// WebSocket server settings
    pub server: ServerSettings,

    /// Conversation pipeline settings
    pub conversation: ConversationSettings,

    /// Completion provider tiers
    pub providers: ProvidersSettings,

    /// Speech-to-text and text-to-speech gateway
    pub speech: SpeechSettings,

    /// Persona sources
    pub personas: PersonaSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind the WebSocket listener to
    pub bind: String,

    /// Greeting sent with `session_started`
    pub greeting: String,

    /// Maximum inbound message size in bytes
    pub max_message_bytes: usize,
}

/// Conversation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// Number of trailing turns included in each turn prompt
    pub history_window: usize,
}

/// Settings for one OpenAI-compatible completion provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Identifier used in logs and attempt records
    pub id: String,

    /// Disabled providers are skipped like unconfigured ones
    pub enabled: bool,

    /// API base URL
    pub base_url: String,

    /// API key (empty = unconfigured)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens in the reply
    pub max_tokens: u32,
}

/// The ordered completion tiers. Order is fixed: primary, then secondary.
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersSettings {
    pub primary: ProviderSettings,
    pub secondary: ProviderSettings,
}

/// Speech gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Enable transcription and synthesis
    pub enabled: bool,

    /// API base URL
    pub base_url: String,

    /// API key (empty = speech unavailable)
    pub api_key: String,

    /// Transcription model
    pub stt_model: String,

    /// Synthesis model
    pub tts_model: String,

    /// Speaking rate passed to synthesis (0.25 - 4.0)
    pub speaking_rate: f32,

    /// Synthesized audio format
    pub audio_format: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Persona source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    /// Directory of additional persona files (.toml / .json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            greeting: "Hi! I'm ready to chat about your idea. Just start talking naturally!"
                .to_string(),
            max_message_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            history_window: crate::conversation::DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl ProviderSettings {
    /// Fast primary tier: Groq's OpenAI-compatible endpoint
    pub fn primary_default() -> Self {
        Self {
            id: "groq".to_string(),
            enabled: true,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            timeout_ms: 8_000,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }

    /// Slower, more capable secondary tier
    pub fn secondary_default() -> Self {
        Self {
            id: "openai".to_string(),
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 20_000,
            temperature: 0.3,
            max_tokens: 1500,
        }
    }

    /// True when the tier can be called at all
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }

    fn apply(&mut self, patch: ProviderPatch) {
        if let Some(v) = patch.id {
            self.id = v;
        }
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.base_url {
            self.base_url = v;
        }
        if let Some(v) = patch.api_key {
            self.api_key = v;
        }
        if let Some(v) = patch.model {
            self.model = v;
        }
        if let Some(v) = patch.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = patch.temperature {
            self.temperature = v;
        }
        if let Some(v) = patch.max_tokens {
            self.max_tokens = v;
        }
    }
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            primary: ProviderSettings::primary_default(),
            secondary: ProviderSettings::secondary_default(),
        }
    }
}

/// Partial provider table as written in a config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProviderPatch {
    id: Option<String>,
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_ms: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

// Each tier has its own defaults, so a partial `[providers.secondary]` table
// must be layered over the secondary defaults, not a shared one.
impl<'de> Deserialize<'de> for ProvidersSettings {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Raw {
            primary: ProviderPatch,
            secondary: ProviderPatch,
        }

        let raw = Raw::deserialize(deserializer)?;
        let mut settings = ProvidersSettings::default();
        settings.primary.apply(raw.primary);
        settings.secondary.apply(raw.secondary);
        Ok(settings)
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1-hd".to_string(),
            speaking_rate: DEFAULT_SPEAKING_RATE,
            audio_format: "mp3".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl SpeechSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without env overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("stepone-persona.toml"),
            dirs::config_dir()
                .map(|p| p.join("stepone").join("persona.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".stepone").join("persona.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server settings
        if let Ok(val) = std::env::var("STEPONE_BIND") {
            self.server.bind = val;
        }
        if let Ok(val) = std::env::var("STEPONE_HISTORY_WINDOW") {
            if let Ok(n) = val.parse() {
                self.conversation.history_window = n;
            }
        }

        // Provider settings
        apply_provider_env(&mut self.providers.primary, "PRIMARY");
        apply_provider_env(&mut self.providers.secondary, "SECONDARY");

        // Conventional vendor variables fill keys left empty
        if self.providers.primary.api_key.is_empty() {
            if let Ok(val) = std::env::var("GROQ_API_KEY") {
                self.providers.primary.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if self.providers.secondary.api_key.is_empty() {
                self.providers.secondary.api_key = val.clone();
            }
            if self.speech.api_key.is_empty() {
                self.speech.api_key = val;
            }
        }

        // Speech settings
        if let Ok(val) = std::env::var("STEPONE_SPEECH_ENABLED") {
            self.speech.enabled = parse_bool(&val);
        }
        if let Ok(val) = std::env::var("STEPONE_SPEECH_BASE_URL") {
            self.speech.base_url = val;
        }
        if let Ok(val) = std::env::var("STEPONE_SPEECH_API_KEY") {
            self.speech.api_key = val;
        }

        // Persona settings
        if let Ok(val) = std::env::var("STEPONE_PERSONA_DIR") {
            self.personas.directory = Some(val);
        }

        // Logging settings
        if let Ok(val) = std::env::var("STEPONE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("STEPONE_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("STEPONE_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref dir) = self.personas.directory {
            self.personas.directory = Some(expand_path(dir));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "server.bind",
                "Bind address cannot be empty",
            ));
        }
        if self.conversation.history_window == 0 {
            return Err(Error::config_field_invalid(
                "conversation.history_window",
                "History window must be at least 1",
            ));
        }

        for (section, provider) in [
            ("providers.primary", &self.providers.primary),
            ("providers.secondary", &self.providers.secondary),
        ] {
            if !(0.0..=2.0).contains(&provider.temperature) {
                return Err(Error::config_field_invalid(
                    format!("{}.temperature", section),
                    "Temperature must be between 0 and 2",
                ));
            }
            if provider.timeout_ms == 0 {
                return Err(Error::config_field_invalid(
                    format!("{}.timeout_ms", section),
                    "Timeout must be greater than zero",
                ));
            }
            if provider.max_tokens == 0 {
                return Err(Error::config_field_invalid(
                    format!("{}.max_tokens", section),
                    "max_tokens must be greater than zero",
                ));
            }
            if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://")
            {
                return Err(Error::config_field_invalid(
                    format!("{}.base_url", section),
                    "Base URL must start with http:// or https://",
                ));
            }
        }

        if !(0.25..=4.0).contains(&self.speech.speaking_rate) {
            return Err(Error::config_field_invalid(
                "speech.speaking_rate",
                "Speaking rate must be between 0.25 and 4.0",
            ));
        }
        if self.speech.timeout_ms == 0 {
            return Err(Error::config_field_invalid(
                "speech.timeout_ms",
                "Timeout must be greater than zero",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Persona directory as a PathBuf, if configured
    pub fn persona_dir(&self) -> Option<PathBuf> {
        self.personas.directory.as_ref().map(PathBuf::from)
    }

    /// Render as TOML with API keys masked
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        for key in [
            &mut shown.providers.primary.api_key,
            &mut shown.providers.secondary.api_key,
            &mut shown.speech.api_key,
        ] {
            if !key.is_empty() {
                *key = "********".to_string();
            }
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

fn apply_provider_env(provider: &mut ProviderSettings, tier: &str) {
    let var = |name: &str| std::env::var(format!("STEPONE_{}_{}", tier, name));

    if let Ok(val) = var("ENABLED") {
        provider.enabled = parse_bool(&val);
    }
    if let Ok(val) = var("BASE_URL") {
        provider.base_url = val;
    }
    if let Ok(val) = var("API_KEY") {
        provider.api_key = val;
    }
    if let Ok(val) = var("MODEL") {
        provider.model = val;
    }
    if let Ok(val) = var("TIMEOUT_MS") {
        if let Ok(n) = val.parse() {
            provider.timeout_ms = n;
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".stepone")
                .join("persona.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# StepOne Persona Configuration

[server]
# Address the WebSocket listener binds to
bind = "127.0.0.1:8000"

# Greeting sent when a session starts
greeting = "Hi! I'm ready to chat about your idea. Just start talking naturally!"

# Maximum inbound message size in bytes
max_message_bytes = 16777216

[conversation]
# Trailing turns included in each completion prompt
history_window = 6

[providers.primary]
# Fast first tier. Leave api_key empty (or set enabled = false) to skip it.
# GROQ_API_KEY or STEPONE_PRIMARY_API_KEY fill an empty key.
id = "groq"
enabled = true
base_url = "https://api.groq.com/openai/v1"
api_key = ""
model = "llama3-8b-8192"
timeout_ms = 8000
temperature = 0.1
max_tokens = 1000

[providers.secondary]
# Second tier, tried when the primary is skipped, fails or refuses.
# OPENAI_API_KEY or STEPONE_SECONDARY_API_KEY fill an empty key.
id = "openai"
enabled = true
base_url = "https://api.openai.com/v1"
api_key = ""
model = "gpt-4o-mini"
timeout_ms = 20000
temperature = 0.3
max_tokens = 1500

[speech]
# Transcription and synthesis gateway (OpenAI-compatible)
enabled = true
base_url = "https://api.openai.com/v1"
api_key = ""
stt_model = "whisper-1"
tts_model = "tts-1-hd"

# 0.25 - 4.0
speaking_rate = 0.95
audio_format = "mp3"
timeout_ms = 60000

[personas]
# Directory of extra persona files (.toml or .json)
# directory = "~/.stepone/personas"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.stepone/logs/persona.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
