//! mnemo - conversational context memory CLI
//!
//! Drives the Mnemo engine against a local SQLite database: record turns,
//! compress and consolidate on demand, and query memory.

use anyhow::{Context, Result};
use clap::Parser;
use mnemo_sdk::Mnemo;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in a .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("mnemo=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Commands that do not need the engine
    match &cli.command {
        Commands::Version => {
            println!("mnemo {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Config(cmd) => return commands::config::execute(cmd, &cli),
        _ => {}
    }

    let config = config::load(&cli)?;
    tracing::debug!(database = %config.database_path.display(), "Opening database");
    let mnemo = Mnemo::open(config).context("Failed to open Mnemo")?;

    match cli.command {
        Commands::Session(cmd) => commands::session::execute(cmd, &mnemo).await,
        Commands::Say {
            session_id,
            text,
            role,
        } => commands::chat::say(&mnemo, &session_id, &role, &text).await,
        Commands::Compress { session_id, force } => {
            commands::memory::compress(&mnemo, &session_id, force).await
        }
        Commands::Consolidate { session_id } => {
            commands::memory::consolidate(&mnemo, &session_id).await
        }
        Commands::Reindex { session_id } => commands::memory::reindex(&mnemo, &session_id).await,
        Commands::Recall {
            session_id,
            query,
            json,
        } => commands::memory::recall(&mnemo, &session_id, &query, json).await,
        Commands::Config(_) | Commands::Version => Ok(()),
    }
}
