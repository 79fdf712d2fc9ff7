//! One-shot index construction: embed every chunk in a single batch,
//! normalize, add in order, persist the pair.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use localrag_core::traits::Embedder;
use localrag_core::types::{BuildPolicy, Chunk};
use localrag_core::{Error, Result};

use crate::flat::{normalize, FlatIndex};
use crate::metadata::MetadataStore;
use crate::store::{IndexPaths, KnowledgeBase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built { chunks: usize },
    Skipped,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    paths: IndexPaths,
    policy: BuildPolicy,
    progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, paths: IndexPaths) -> Self {
        Self { embedder, paths, policy: BuildPolicy::default(), progress: false }
    }

    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Show a terminal spinner while the batch is embedded.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Build and persist an index over `chunks` unless the policy says to
    /// keep the existing one.
    pub fn build(&self, chunks: Vec<Chunk>) -> Result<BuildOutcome> {
        match self.policy {
            BuildPolicy::IfAbsent if self.paths.exists() => {
                info!(path = %self.paths.index.display(), "index already exists; skipping build");
                return Ok(BuildOutcome::Skipped);
            }
            BuildPolicy::Force => self.paths.remove()?,
            _ => {}
        }
        let kb = self.build_in_memory(chunks)?;
        kb.persist(&self.paths)?;
        info!(chunks = kb.ntotal(), "index built");
        Ok(BuildOutcome::Built { chunks: kb.ntotal() })
    }

    /// Embed and index `chunks` without touching the filesystem. Chunk `i`
    /// gets ordinal `i`.
    pub fn build_in_memory(&self, chunks: Vec<Chunk>) -> Result<KnowledgeBase> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut index = FlatIndex::new();
        if !texts.is_empty() {
            let mut vectors = self.embed_all(&texts)?;
            vectors.iter_mut().for_each(|v| normalize(v));
            index.add(&vectors)?;
        }
        Ok(KnowledgeBase::new(index, MetadataStore::from_chunks(chunks)))
    }

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let spinner = self.progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
                pb.set_style(style);
            }
            pb.set_message(format!("Embedding {} chunks", texts.len()));
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        let result = self.embedder.embed_batch(texts);
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let vectors = result.map_err(|e| Error::Embedding(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}
