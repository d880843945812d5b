//! courseforge CLI.
//!
//! Resolves course directories and converts them into storage documents,
//! a searchable libSQL store, or a single markdown book.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}