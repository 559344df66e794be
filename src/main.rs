use clap::Parser;
use pmp_split_engine::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => cli::simulate::run(args).await,
    }
}
