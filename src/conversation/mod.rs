//! Conversation logic
//!
//! Pure, network-free pieces of a persona exchange: question classification,
//! prompt composition, the offline simulator and voice selection.

pub mod classifier;
pub mod prompt;
pub mod simulator;
pub mod turn;
pub mod voice;

pub use classifier::{classify, QuestionStyle};
pub use prompt::{ComposedPrompt, PromptComposer, DEFAULT_HISTORY_WINDOW};
pub use simulator::{simulate, simulate_explained, stable_hash};
pub use turn::{ConversationTurn, Speaker};
pub use voice::{pace_for_speech, select_voice, VoiceId, VoiceProfile};
