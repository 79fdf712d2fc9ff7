//! Domain types shared by the ingestion, index and generation crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provenance carried by documents and every chunk derived from them.
///
/// `source_file` is always present; loaders may attach further string fields
/// which are flattened next to it when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub source_file: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self { source_file: source_file.into(), extra: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Raw loaded content plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new(source_file) }
    }
}

/// A bounded text segment of a document. Owns its own copy of the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

/// Persisted metadata record, keyed by the vector's ordinal in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub metadata: Metadata,
}

impl From<Chunk> for IndexEntry {
    fn from(chunk: Chunk) -> Self {
        Self { text: chunk.text, metadata: chunk.metadata }
    }
}

/// One retrieved chunk. `distance` is the raw squared-L2 score on normalized
/// vectors: lower is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub text: String,
    pub source_file: String,
    pub distance: f32,
}

/// When an index build is allowed to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// Skip the build when a persisted index already exists.
    #[default]
    IfAbsent,
    /// Rebuild and overwrite both artifacts.
    Always,
    /// Delete both artifacts before rebuilding.
    Force,
}

/// A completed `(query, answer)` exchange in a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// A request to the generative model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Upper bound on generated tokens, forwarded to the backend.
    pub max_tokens: u32,
}
