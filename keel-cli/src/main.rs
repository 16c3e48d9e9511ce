//! Keel CLI - command-line interface for migration synthesis.

use clap::Parser;

use keel_cli::cli::{Cli, Command};
use keel_cli::commands;
use keel_cli::error::CliResult;
use keel_cli::output;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init(args) => commands::init::run(args, &cli.global).await,
        Command::Generate(args) => commands::generate::run(args, &cli.global).await,
        Command::Status(args) => commands::status::run(args, &cli.global).await,
        Command::Version => commands::version::run().await,
    }
}
