use std::sync::Arc;

use tracing::{debug, warn};

use localrag_core::traits::Embedder;
use localrag_core::types::RetrievalResult;
use localrag_core::{Error, Result};

use crate::flat::normalize;
use crate::store::KnowledgeBase;

/// Results of one similarity search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Nearest first.
    pub results: Vec<RetrievalResult>,
    /// Neighbors skipped because their ordinal had no metadata entry.
    pub dropped: usize,
}

/// Query-side view of a knowledge base: embeds the query with the same model
/// the index was built with and resolves neighbors to chunk records.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    kb: Arc<KnowledgeBase>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever").field("kb", &self.kb).finish_non_exhaustive()
    }
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, kb: Arc<KnowledgeBase>) -> Self {
        Self { embedder, kb }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn search_similar(&self, query: &str, k: usize) -> Result<Retrieval> {
        if k == 0 || self.kb.ntotal() == 0 {
            return Ok(Retrieval::default());
        }
        let mut vector = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(|e| Error::Embedding(e.to_string()))?
            .pop()
            .ok_or_else(|| Error::Embedding("embedder returned no vector for the query".into()))?;
        normalize(&mut vector);

        let neighbors = self.kb.index().search(&vector, k)?;
        let mut retrieval = Retrieval { results: Vec::with_capacity(neighbors.len()), dropped: 0 };
        for (distance, ordinal) in neighbors.iter() {
            match self.kb.metadata().get(ordinal) {
                Some(entry) => retrieval.results.push(RetrievalResult {
                    text: entry.text.clone(),
                    source_file: entry.metadata.source_file.clone(),
                    distance,
                }),
                None => retrieval.dropped += 1,
            }
        }
        if retrieval.dropped > 0 {
            warn!(dropped = retrieval.dropped, "neighbors without metadata were dropped");
        }
        debug!(k, returned = retrieval.results.len(), "similarity search");
        Ok(retrieval)
    }
}
