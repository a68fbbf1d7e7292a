use clap::Parser;
use coldflow_api_keys::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::CleanupExpired => cli::cleanup::run().await,
    }
}
