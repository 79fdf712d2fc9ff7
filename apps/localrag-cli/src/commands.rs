use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use tracing::{info, warn};

use localrag_core::chunker::TextSplitter;
use localrag_core::config::{Config, Settings};
use localrag_core::loader::DocumentLoader;
use localrag_core::traits::Embedder;
use localrag_core::types::BuildPolicy;
use localrag_core::Error;
use localrag_embed::load_embedder;
use localrag_index::{BuildOutcome, IndexBuilder, IndexPaths, KnowledgeBase, Retriever};
use localrag_llm::OllamaClient;
use localrag_rag::{format_results, ChatSession, GenerateOptions, RagOrchestrator, Reply};

use crate::cli::{Cli, Command};
use crate::repl;

/// Layered settings with paths anchored at the working directory.
pub fn load_settings() -> Result<Settings> {
    let config = Config::load().context("loading configuration")?;
    let base = std::env::current_dir()?;
    Ok(config.settings()?.resolved(&base))
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings()?;
    match cli.command {
        Command::Index { docs_dir, policy } => {
            match run_index(&settings, docs_dir, policy.map(Into::into))? {
                BuildOutcome::Built { chunks } => println!("✅ Indexed {chunks} chunks into {}", settings.index.index_path.display()),
                BuildOutcome::Skipped => println!("Index already exists at {} (use --policy always to rebuild)", settings.index.index_path.display()),
            }
        }
        Command::Search { query, k } => {
            let k = checked_k(&settings, k)?;
            let retriever = open_retriever(&settings)?;
            let retrieval = retriever.search_similar(&query, k)?;
            println!("{}", format_results(&retrieval.results));
            if retrieval.dropped > 0 {
                eprintln!("⚠️  {} results skipped: index and metadata are out of sync", retrieval.dropped);
            }
        }
        Command::Ask { query, k, no_rag, stream, model } => {
            let options = generate_options(&settings, k, no_rag, stream, model)?;
            let orchestrator = build_orchestrator(&settings, open_retriever(&settings)?);
            let mut printer = ReplyPrinter::default();
            let mut replies = orchestrator.generate(query, options.clone());
            let mut last = None;
            while let Some(reply) = replies.next().await {
                let reply = reply?;
                printer.print(&reply)?;
                last = Some(reply);
            }
            println!();
            if options.use_retrieval {
                let results = last.map(|r| r.results).unwrap_or_default();
                println!("\n🔍 Retrieved context\n{}", format_results(&results));
            }
        }
        Command::Chat { k, no_rag, stream, model } => {
            let options = generate_options(&settings, k, no_rag, stream, model)?;
            let client = Arc::new(OllamaClient::from_settings(&settings.llm));
            let orchestrator = RagOrchestrator::new(open_retriever(&settings)?, client.clone())
                .with_max_tokens(settings.llm.max_tokens);
            let session = ChatSession::new(options);
            repl::run(&settings, &orchestrator, &client, session).await?;
        }
    }
    Ok(())
}

/// Load, chunk, embed and persist the documents under `docs_dir`.
pub fn run_index(settings: &Settings, docs_dir: Option<PathBuf>, policy: Option<BuildPolicy>) -> Result<BuildOutcome> {
    let docs_dir = docs_dir.unwrap_or_else(|| settings.data.docs_dir.clone());
    let policy = policy.unwrap_or(settings.index.build_policy);
    let paths = IndexPaths::from_settings(&settings.index);
    if policy == BuildPolicy::IfAbsent && paths.exists() {
        info!(path = %paths.index.display(), "index already exists; skipping build");
        return Ok(BuildOutcome::Skipped);
    }

    let documents = DocumentLoader::with_extensions(&settings.data.extensions)
        .load_dir(&docs_dir)
        .with_context(|| format!("loading documents from {}", docs_dir.display()))?;
    let chunks = TextSplitter::from_settings(&settings.chunking)?.split_documents(&documents);
    info!(documents = documents.len(), chunks = chunks.len(), "documents chunked");

    let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&settings.embedding)?);
    let outcome = IndexBuilder::new(embedder, paths).with_policy(policy).with_progress(true).build(chunks)?;
    Ok(outcome)
}

/// Open the persisted knowledge base and pair it with the configured embedder.
/// Fails with [`Error::IndexMissing`] before any model is loaded when no index exists.
pub fn open_retriever(settings: &Settings) -> Result<Retriever> {
    let paths = IndexPaths::from_settings(&settings.index);
    let kb = KnowledgeBase::open(&paths, settings.index.strict_consistency)?;
    let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&settings.embedding)?);
    if let Some(dim) = kb.index().dim() {
        if dim != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedder.dim() }.into());
        }
    }
    Ok(Retriever::new(embedder, Arc::new(kb)))
}

pub fn build_orchestrator(settings: &Settings, retriever: Retriever) -> RagOrchestrator {
    RagOrchestrator::new(retriever, Arc::new(OllamaClient::from_settings(&settings.llm)))
        .with_max_tokens(settings.llm.max_tokens)
}

pub fn checked_k(settings: &Settings, k: Option<usize>) -> Result<usize> {
    let k = k.unwrap_or(settings.retrieval.k);
    if k == 0 || k > settings.retrieval.max_k {
        bail!("k must be between 1 and {} (got {k})", settings.retrieval.max_k);
    }
    Ok(k)
}

pub fn generate_options(
    settings: &Settings,
    k: Option<usize>,
    no_rag: bool,
    stream: bool,
    model: Option<String>,
) -> Result<GenerateOptions> {
    let mut options = GenerateOptions::from_settings(settings);
    options.k = checked_k(settings, k)?;
    options.use_retrieval = !no_rag;
    options.stream = stream;
    if let Some(model) = model {
        if !settings.llm.models.is_empty() && !settings.llm.models.contains(&model) {
            warn!(model = %model, "model is not in llm.models");
        }
        options.model = model;
    }
    Ok(options)
}

/// Writes each reply's new suffix so streamed answers appear incrementally.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    pub fn print(&mut self, reply: &Reply) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        match reply.text.get(self.printed..) {
            Some(rest) => out.write_all(rest.as_bytes())?,
            None => {
                out.write_all(b"\n")?;
                out.write_all(reply.text.as_bytes())?;
            }
        }
        self.printed = reply.text.len();
        out.flush()
    }
}
