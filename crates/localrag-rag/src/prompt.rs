use localrag_core::types::{ChatMessage, RetrievalResult};

pub const CONTEXT_HEADER: &str = "Answer the question based on the following information:";

/// The system prompt carrying the retrieved context, one
/// `Content:`/`Source:` block per result.
pub fn system_prompt(results: &[RetrievalResult]) -> String {
    let context = results
        .iter()
        .map(|r| format!("Content: {}\nSource: {}", r.text, r.source_file))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{CONTEXT_HEADER}\n{context}")
}

/// `[system, user]` when a context is given (even an empty one), else `[user]`.
pub fn build_messages(query: &str, context: Option<&[RetrievalResult]>) -> Vec<ChatMessage> {
    match context {
        Some(results) => vec![ChatMessage::system(system_prompt(results)), ChatMessage::user(query)],
        None => vec![ChatMessage::user(query)],
    }
}
