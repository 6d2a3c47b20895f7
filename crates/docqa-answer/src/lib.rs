//! docqa-answer
//!
//! Turns ranked chunks into a cited answer: context assembly under a
//! character budget, prompt templates, a sequential provider fallback chain
//! with per-provider timeouts, and bounded chat history.

pub mod context;
pub mod fallback;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod session;

pub use fallback::{FallbackChain, Generation, ProviderFailure};
pub use orchestrator::{Answer, AnswerStatus, Citation, Orchestrator};
pub use session::{HistoryEntry, Session};
