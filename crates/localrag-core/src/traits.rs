use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::ChatRequest;

/// Maps text to fixed-dimension vectors. `embed_batch` must preserve order:
/// output `i` is the embedding of input `i`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Incremental content deltas of a streamed completion.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// The generative-model boundary.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run the request to completion and return the whole answer.
    async fn chat(&self, request: &ChatRequest) -> Result<String>;

    /// Start the request and return its content deltas as they arrive.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream>;
}
