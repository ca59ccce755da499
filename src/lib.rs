//! Streaming DeepSeek client: an interactive chat loop that separates the
//! model's reasoning from its answer, and a small HTTP translation service.

pub mod commands;
pub mod config;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod server;
pub mod session;
pub mod streaming;
pub mod translator;

pub use config::Config;
pub use events::{Channel, ConversationRole, ModelKind, ResponseFragment, Turn};
pub use llm::{ChatBackend, DeepSeekClient, FragmentStream, LlmError};
pub use session::{ConversationHistory, ConversationManager, Reply, Session, TurnOutcome};
pub use streaming::{ResponseSplitter, SplitResult, SplitState, split, split_with};
pub use translator::{TranslateError, Translation, Translator};
