use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use localrag_core::types::BuildPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "localrag",
    version,
    about = "Ask questions about a folder of text files using a local LLM",
    long_about = "Indexes plain-text documents into an exact vector index and answers questions \
                  with a locally running Ollama model, grounded on the most similar chunks.\n\n\
                  Settings come from config.toml, config.<RUST_ENV>.toml and APP_* environment \
                  variables (e.g. APP_LLM__MODEL=llama3)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Load, chunk and embed documents into the persisted index")]
    Index {
        /// Document folder (defaults to data.docs_dir)
        docs_dir: Option<PathBuf>,

        /// When to (re)build (defaults to index.build_policy)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    #[command(about = "Show the chunks most similar to a query")]
    Search {
        query: String,

        /// Number of results (defaults to retrieval.k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    #[command(about = "Answer one question")]
    Ask {
        query: String,

        #[arg(short, long)]
        k: Option<usize>,

        /// Send the question without retrieved context
        #[arg(long)]
        no_rag: bool,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,

        /// Model name (defaults to llm.model)
        #[arg(short, long)]
        model: Option<String>,
    },

    #[command(about = "Interactive chat session (type /help inside)")]
    Chat {
        #[arg(short, long)]
        k: Option<usize>,

        #[arg(long)]
        no_rag: bool,

        #[arg(long)]
        stream: bool,

        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    /// Build only when no index exists
    IfAbsent,
    /// Rebuild, overwriting the existing index
    Always,
    /// Delete the existing index files, then rebuild
    Force,
}

impl From<PolicyArg> for BuildPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::IfAbsent => BuildPolicy::IfAbsent,
            PolicyArg::Always => BuildPolicy::Always,
            PolicyArg::Force => BuildPolicy::Force,
        }
    }
}
