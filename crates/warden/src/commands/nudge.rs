//! Real-time nudge command.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::sync::Arc;
use warden_core::command::CommandInjector;
use warden_core::tmux::{TerminalGateway, TmuxGateway};
use warden_core::Error;

use crate::config::Config;

pub async fn execute(session: &str, message: &str, _config: &Config) -> Result<()> {
    if message.trim().is_empty() {
        return Err(anyhow!("Nudge message cannot be empty"));
    }

    println!("{}", format!("Nudging {}...", session).cyan());

    // Same safety gate the server-side engine uses.
    let gateway: Arc<dyn TerminalGateway> = Arc::new(TmuxGateway::default());
    let injector = CommandInjector::new(gateway);
    let formatted = format!("# NUDGE: {}", message);

    match injector.inject_command(session, &formatted, true).await {
        Ok(_) => {
            println!("{}", "✓ Nudge sent".green());
            Ok(())
        }
        Err(Error::Validation { reason, .. }) => {
            println!("{}", format!("✗ Rejected: {}", reason).red());
            Ok(())
        }
        Err(Error::SessionNotReady(_)) => {
            println!("{}", format!("✗ Session {} not found", session).red());
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
