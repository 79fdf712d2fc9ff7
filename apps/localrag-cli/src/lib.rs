//! localrag command-line front end: indexing, search, one-shot answers and an
//! interactive chat over the local knowledge base.

pub mod cli;
pub mod commands;
pub mod repl;

use tracing_subscriber::EnvFilter;

/// Log to stderr so answers on stdout stay clean. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
