use futures::StreamExt;
use tracing::debug;

use localrag_core::types::ChatTurn;
use localrag_core::Result;

use crate::orchestrator::{GenerateOptions, RagOrchestrator, Reply};

/// One conversation: its completed turns and the options used for the next
/// question. History is kept in memory only.
#[derive(Debug, Clone)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    pub options: GenerateOptions,
}

impl ChatSession {
    pub fn new(options: GenerateOptions) -> Self {
        Self { history: Vec::new(), options }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn push(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.history.push(ChatTurn { query: query.into(), answer: answer.into() });
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask `query` with the session's options, handing every reply to
    /// `on_reply` as it arrives. The turn is recorded once the answer is
    /// complete; a failed generation records nothing.
    pub async fn respond<F>(&mut self, orchestrator: &RagOrchestrator, query: &str, mut on_reply: F) -> Result<Option<Reply>>
    where
        F: FnMut(&Reply),
    {
        let mut replies = orchestrator.generate(query, self.options.clone());
        let mut last = None;
        while let Some(reply) = replies.next().await {
            let reply = reply?;
            on_reply(&reply);
            last = Some(reply);
        }
        let answer = last.as_ref().map(|r| r.text.clone()).unwrap_or_default();
        self.push(query, answer);
        debug!(turns = self.history.len(), "turn recorded");
        Ok(last)
    }
}
