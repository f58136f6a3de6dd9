//! Backend module for external AI services
//!
//! Completion providers, the provider chain with its policy filter, and the
//! speech gateways used by the streaming orchestrator.

mod chain;
mod openai;
mod traits;

#[cfg(test)]
pub mod mock;

pub use chain::*;
pub use openai::{OpenAiProvider, OpenAiSpeech};
pub use traits::*;
