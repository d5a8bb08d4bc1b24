use clap::Parser;
use marketplace_cache::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::commands::run(cli.command).await
}
