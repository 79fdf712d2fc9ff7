//! localrag-rag
//!
//! Retrieval-augmented generation over a loaded knowledge base: prompt
//! assembly, the streaming orchestrator, and per-conversation history.

pub mod format;
pub mod orchestrator;
pub mod prompt;
pub mod session;

pub use format::format_results;
pub use orchestrator::{GenerateOptions, RagOrchestrator, Reply, ReplyStream};
pub use session::ChatSession;
