use clap::Parser;
use research_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Worker => cli::worker::run().await,
        Command::Run(args) => cli::run::run(args).await,
        Command::Cache { action } => cli::cache::run(action).await,
    }
}
