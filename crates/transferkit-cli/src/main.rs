//! Transferkit CLI
//!
//! Transfer-metadata extraction for educational content.

use anyhow::Result;
use clap::Parser;
use transferkit_core::error::exit_codes;
use transferkit_core::{Config, Database, TransferError};

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<TransferError>()
            .map(TransferError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // TRANSFERKIT_DB overrides the default location
    let db = Database::open(Database::default_path())?;
    db.initialize()?;

    match cli.command {
        Commands::Content(args) => commands::content::run(args, &db, cli.format).await,
        Commands::Extract(args) => commands::extract::run(args, db, &config, cli.format).await,
        Commands::ExtractAll(args) => {
            commands::extract::run_all(args, db, &config, cli.format).await
        }
        Commands::Show(args) => commands::show::run(args, &db, cli.format).await,
        Commands::Providers => commands::providers::run(&config, cli.format).await,
    }
}
