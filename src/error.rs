//! Error types for the persona interview service
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Scope classification (tier, unit, session)
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Transport errors (3xx)
    ConnectionFailed = 300,
    ConnectionLost = 303,

    // Protocol errors (4xx)
    ProtocolMalformed = 401,

    // Completion provider errors (5xx)
    ProviderUnconfigured = 500,
    ProviderTimeout = 501,
    ProviderFailed = 502,
    PolicyRejected = 503,

    // Speech gateway errors (6xx)
    TranscriptionFailed = 600,
    SynthesisFailed = 601,

    // Persona / session errors (7xx)
    PersonaInvalid = 700,
    PersonaNotFound = 701,
    SessionClosed = 702,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Transport errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Provider errors
            600..=699 => 60, // Speech errors
            700..=799 => 70, // Persona/session errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed{}: {message}", field_suffix(.field))]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// Failed to bind or accept a connection
    #[error("Failed to listen on {addr}: {message}")]
    ConnectionFailed { addr: String, message: String },

    /// Caller went away mid-session
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed inbound message
    #[error("Malformed session message: {message}")]
    ProtocolMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Completion Provider Errors (tier-scoped)
    // ─────────────────────────────────────────────────────────────

    /// Provider has no credentials or is disabled
    #[error("Provider {provider} is not configured")]
    ProviderUnconfigured { provider: String },

    /// Provider did not answer within its tier timeout
    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// Provider answered with a non-success response
    #[error("Provider {provider} failed: {message}")]
    ProviderFailed { provider: String, message: String },

    /// Provider text tripped the refusal filter
    #[error("Provider {provider} returned a policy refusal (marker '{marker}')")]
    PolicyRejected { provider: String, marker: String },

    // ─────────────────────────────────────────────────────────────
    // Speech Gateway Errors
    // ─────────────────────────────────────────────────────────────

    /// Speech-to-text failed (unit-scoped)
    #[error("Transcription failed: {message}")]
    Transcription { message: String, timed_out: bool },

    /// Text-to-speech failed (degrades to text-only)
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String, timed_out: bool },

    // ─────────────────────────────────────────────────────────────
    // Persona / Session Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona definition rejected at session creation
    #[error("Invalid persona '{name}': {reason}")]
    PersonaInvalid { name: String, reason: String },

    /// Persona id not present in the registry
    #[error("Persona not found: {id}")]
    PersonaNotFound { id: String },

    /// Unit submitted after the session completed
    #[error("Session {session_id} is already completed")]
    SessionClosed { session_id: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// " (field.path)" when a config field is known, otherwise nothing.
fn field_suffix(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(" ({})", f)).unwrap_or_default()
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::WebSocket(_) => ErrorCode::ConnectionLost,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,

            Error::ProviderUnconfigured { .. } => ErrorCode::ProviderUnconfigured,
            Error::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
            Error::ProviderFailed { .. } => ErrorCode::ProviderFailed,
            Error::PolicyRejected { .. } => ErrorCode::PolicyRejected,

            Error::Transcription { .. } => ErrorCode::TranscriptionFailed,
            Error::Synthesis { .. } => ErrorCode::SynthesisFailed,

            Error::PersonaInvalid { .. } => ErrorCode::PersonaInvalid,
            Error::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            Error::SessionClosed { .. } => ErrorCode::SessionClosed,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is absorbed by the conversation pipeline.
    ///
    /// Provider errors advance the tier chain, transcription errors fail a
    /// single unit and synthesis errors degrade to a text-only reply. None of
    /// them may end an active session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnconfigured { .. }
                | Error::ProviderTimeout { .. }
                | Error::ProviderFailed { .. }
                | Error::PolicyRejected { .. }
                | Error::Transcription { .. }
                | Error::Synthesis { .. }
                | Error::ProtocolMalformed { .. }
        )
    }

    /// Check if an external call ended by running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::ProviderTimeout { .. }
                | Error::Transcription { timed_out: true, .. }
                | Error::Synthesis { timed_out: true, .. }
        )
    }

    /// Check if the error is fatal (process or session creation must stop)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::PersonaInvalid { .. }
                | Error::PersonaNotFound { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'stepone-persona config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'stepone-persona config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options."
            ),

            Error::ConnectionFailed { .. } => Some(
                "Check that the bind address is free and that you have permission to listen on it."
            ),

            Error::ProviderUnconfigured { .. } => Some(
                "Set an API key for the provider (e.g. STEPONE_PRIMARY_API_KEY) or rely on the offline simulator."
            ),
            Error::ProviderTimeout { .. } => Some(
                "The provider is slow or unreachable. Raise 'timeout_ms' for that tier if this persists."
            ),

            Error::Transcription { .. } => Some(
                "Check the speech API key and that the audio encoding matches the uploaded bytes."
            ),
            Error::Synthesis { .. } => Some(
                "Speech quota may be exhausted. Replies will continue as text only."
            ),

            Error::PersonaInvalid { .. } => Some(
                "A persona needs at least a non-empty name and role."
            ),
            Error::PersonaNotFound { .. } => Some(
                "Run 'stepone-persona persona list' to see available persona ids."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a provider failure
    pub fn provider_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a transcription failure
    pub fn transcription(message: impl Into<String>) -> Self {
        Error::Transcription {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a transcription failure caused by the gateway timing out
    pub fn transcription_timeout(message: impl Into<String>) -> Self {
        Error::Transcription {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Create a synthesis failure
    pub fn synthesis(message: impl Into<String>) -> Self {
        Error::Synthesis {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a synthesis failure caused by the gateway timing out
    pub fn synthesis_timeout(message: impl Into<String>) -> Self {
        Error::Synthesis {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Create a persona validation error
    pub fn persona_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PersonaInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
