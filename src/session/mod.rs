//! Conversation sessions
//!
//! Session state and the streaming orchestrator that drives one session.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{InboundUnit, PipelineServices, StreamingOrchestrator, UnitReply, TRANSCRIPTION_APOLOGY};
pub use state::SessionSummary;
