//! Persona system: the synthetic customer a founder interviews.
//!
//! Personas are normalized once at the session boundary and are immutable
//! afterwards. The registry serves bundled samples and user persona files.

pub mod registry;
pub mod types;

pub use registry::{PersonaRegistry, PersonaSource};
pub use types::{Persona, PersonaInput};
