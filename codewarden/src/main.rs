// codewarden/src/main.rs
//! Entry point for the `codewarden` binary.

use anyhow::Result;
use clap::Parser;

use codewarden::cli::{Cli, Commands};
use codewarden::{commands, logger};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    logger::init_logger(cli.debug, cli.quiet);
    if let Ok(path) = dotenv {
        log::debug!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Scrub(cmd) => commands::scrub::run_scrub(cmd),
        Commands::Send(cmd) => commands::send::run_send(cmd).await,
        Commands::CheckDsn { dsn } => commands::check_dsn::run_check_dsn(&dsn),
        Commands::Patterns(cmd) => commands::patterns::run_patterns(cmd),
    }
}
