//! Newline-delimited JSON framing for Ollama's streaming responses.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use localrag_core::traits::FragmentStream;
use localrag_core::{Error, Result};

/// Reassembles lines from arbitrarily split byte chunks. Bytes are buffered
/// until a newline arrives, so multi-byte characters may straddle chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `bytes`; returns every line completed by them, without blanks.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the input ends without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// One object of a chat response, streamed or not.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse one streamed line. `Ok(None)` for lines that carry no text, such as
/// the final `done` record.
pub fn parse_line(line: &str) -> Result<Option<String>> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| Error::Generation(format!("malformed stream line: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(Error::Generation(error));
    }
    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    if content.is_empty() {
        tracing::trace!(done = chunk.done, "stream line without content");
        return Ok(None);
    }
    Ok(Some(content))
}

/// Turn a raw body stream into content fragments. The first malformed or
/// error line ends the stream with that error.
pub fn fragments<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = async_stream::try_stream! {
        let mut decoder = LineDecoder::new();
        let mut body = Box::pin(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::Generation(format!("reading response stream: {e}")))?;
            for line in decoder.push(chunk.as_ref()) {
                if let Some(fragment) = parse_line(&line)? {
                    yield fragment;
                }
            }
        }
        if let Some(line) = decoder.finish() {
            if let Some(fragment) = parse_line(&line)? {
                yield fragment;
            }
        }
    };
    stream.boxed()
}
