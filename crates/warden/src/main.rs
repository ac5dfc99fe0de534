//! warden - Orchestrator supervision CLI
//!
//! Local inspection and intervention for supervised agent sessions.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("warden=warn".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Status { json } => commands::status::execute(json, &config).await,
        Commands::Peek { session } => commands::peek::execute(&session, &config).await,
        Commands::Check { session, threshold } => {
            commands::check::execute(&session, threshold, &config).await
        }
        Commands::Nudge { session, message } => {
            commands::nudge::execute(&session, &message, &config).await
        }
        Commands::Audit(cmd) => commands::audit::execute(cmd, &config).await,
        Commands::Version => {
            println!("warden {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
