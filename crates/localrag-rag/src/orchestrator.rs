use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info, warn};

use localrag_core::config::Settings;
use localrag_core::traits::ChatModel;
use localrag_core::types::{ChatRequest, RetrievalResult};
use localrag_core::Result;
use localrag_index::{Retrieval, Retriever};

use crate::prompt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub k: usize,
    pub stream: bool,
    pub use_retrieval: bool,
    pub model: String,
}

impl GenerateOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            k: settings.retrieval.k,
            stream: false,
            use_retrieval: true,
            model: settings.llm.model.clone(),
        }
    }
}

/// One observation of an answer in progress. In streaming mode `text` is the
/// answer so far; `results` is the same shared list on every reply of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub results: Arc<Vec<RetrievalResult>>,
    /// Neighbors dropped for lack of metadata.
    pub dropped: usize,
}

pub type ReplyStream = BoxStream<'static, Result<Reply>>;

pub struct RagOrchestrator {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl RagOrchestrator {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>) -> Self {
        Self { retriever, model, max_tokens: 500 }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query`, optionally grounded on the `k` nearest chunks.
    ///
    /// Nothing runs until the stream is first polled. A streaming call yields
    /// the accumulated text after every fragment; a buffered call yields once.
    /// A model failure ends the stream with an error item.
    pub fn generate(&self, query: impl Into<String>, options: GenerateOptions) -> ReplyStream {
        let query = query.into();
        let retriever = self.retriever.clone();
        let model = Arc::clone(&self.model);
        let max_tokens = self.max_tokens;

        let stream = async_stream::try_stream! {
            let (results, dropped, messages) = if options.use_retrieval {
                let retrieval = retrieve(&retriever, &query, options.k);
                let messages = prompt::build_messages(&query, Some(retrieval.results.as_slice()));
                (retrieval.results, retrieval.dropped, messages)
            } else {
                (Vec::new(), 0, prompt::build_messages(&query, None))
            };
            let results = Arc::new(results);
            let request = ChatRequest { model: options.model, messages, max_tokens };
            info!(model = %request.model, context = results.len(), stream = options.stream, "generating answer");

            if options.stream {
                let mut fragments = model.chat_stream(&request).await?;
                let mut text = String::new();
                while let Some(fragment) = fragments.next().await {
                    text.push_str(&fragment?);
                    yield Reply { text: text.clone(), results: Arc::clone(&results), dropped };
                }
                debug!(chars = text.chars().count(), "stream finished");
            } else {
                let text = model.chat(&request).await?;
                yield Reply { text, results, dropped };
            }
        };
        stream.boxed()
    }
}

/// Retrieval problems degrade to an empty context rather than failing the answer.
fn retrieve(retriever: &Retriever, query: &str, k: usize) -> Retrieval {
    match retriever.search_similar(query, k) {
        Ok(retrieval) => retrieval,
        Err(e) => {
            warn!(error = %e, "retrieval failed; answering without context");
            Retrieval::default()
        }
    }
}
