//! localrag-llm
//!
//! Client for a locally running Ollama server behind
//! `localrag_core::traits::ChatModel`.

pub mod ndjson;
pub mod ollama;

pub use ollama::OllamaClient;
