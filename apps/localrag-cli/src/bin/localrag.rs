use clap::Parser;

use localrag_cli::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    localrag_cli::init_tracing();
    let cli = Cli::parse();
    localrag_cli::commands::run(cli).await
}
