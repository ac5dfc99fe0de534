//! Peek at a session's current output.

use anyhow::Result;
use colored::Colorize;
use warden_core::snapshot::content_hash;
use warden_core::tmux::{TerminalGateway, TmuxGateway};

use crate::config::Config;

pub async fn execute(session: &str, config: &Config) -> Result<()> {
    let gateway = TmuxGateway::default();

    println!("{}", format!("Session: {}", session).cyan().bold());
    println!("{}", "─".repeat(50));

    if !gateway.session_exists(session).await? {
        println!("  Status: {}", "NOT FOUND".red());
        return Ok(());
    }
    println!("  Status: {}", "RUNNING".green());

    let content = gateway
        .capture_pane(session, config.monitoring.scrollback_lines)
        .await?;
    println!("  Content hash: {}", content_hash(&content));

    println!();
    println!("{}", "Last output:".cyan());
    println!("{}", "─".repeat(50));
    let lines: Vec<&str> = content.lines().collect();
    for line in lines.iter().rev().take(10).rev() {
        println!("  {}", line);
    }

    Ok(())
}
