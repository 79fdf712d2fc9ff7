//! Separator-based text splitting with a sliding character overlap.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Splits text on a literal separator and packs the pieces into windows of at
/// most `chunk_size` characters. Consecutive windows share up to
/// `chunk_overlap` characters of trailing pieces.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separator: impl Into<String>) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if chunk_overlap > chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must not exceed chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, separator: separator.into() })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap, settings.separator.clone())
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<&str> = if self.separator.is_empty() {
            text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect()
        } else {
            text.split(self.separator.as_str()).filter(|p| !p.is_empty()).collect()
        };
        self.merge(&pieces)
    }

    /// Split every document; each chunk gets its own copy of the metadata.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let before = chunks.len();
            chunks.extend(
                self.split_text(&doc.content)
                    .into_iter()
                    .map(|text| Chunk { text, metadata: doc.metadata.clone() }),
            );
            debug!(source = %doc.metadata.source_file, chunks = chunks.len() - before, "split document");
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let sep_len = self.separator.chars().count();
        let joiner = |window: &VecDeque<(&str, usize)>| if window.is_empty() { 0 } else { sep_len };

        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = piece.chars().count();
            if total + len + joiner(&window) > self.chunk_size && !window.is_empty() {
                self.emit(&window, &mut out);
                while total > self.chunk_overlap
                    || (total > 0 && total + len + joiner(&window) > self.chunk_size)
                {
                    let Some((_, first)) = window.pop_front() else { break };
                    total -= first + joiner(&window);
                }
            }
            window.push_back((piece, len));
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }
        self.emit(&window, &mut out);
        out
    }

    fn emit(&self, window: &VecDeque<(&str, usize)>, out: &mut Vec<String>) {
        let joined = window.iter().map(|(p, _)| *p).collect::<Vec<_>>().join(&self.separator);
        let text = joined.trim();
        if text.is_empty() {
            return;
        }
        let size = text.chars().count();
        if size > self.chunk_size {
            warn!(size, limit = self.chunk_size, "created a chunk longer than the configured size");
        }
        out.push(text.to_string());
    }
}

/// Split `documents` on newlines into chunks of at most `chunk_size`
/// characters overlapping by up to `chunk_overlap`.
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TextSplitter::new(chunk_size, chunk_overlap, "\n")?.split_documents(documents))
}
