//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// Warden CLI
///
/// Inspect and intervene in supervised coding-agent sessions.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// System status dashboard (orchestrators, sessions, health)
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Peek at a session's current output and content hash
    Peek {
        /// tmux session name to inspect
        session: String,
    },

    /// One-off local stall check against the last recorded snapshot
    Check {
        /// tmux session name to check
        session: String,
        /// Stall threshold in seconds (defaults to config)
        #[arg(long)]
        threshold: Option<i64>,
    },

    /// Send a nudge message to a session (goes through the safety gate)
    Nudge {
        /// tmux session name to nudge
        session: String,
        /// Message to send
        message: String,
    },

    /// Audit trail queries
    Audit(AuditCommand),

    /// Print version
    Version,
}

#[derive(Args, Debug)]
pub struct AuditCommand {
    #[command(subcommand)]
    pub action: AuditAction,
}

#[derive(Subcommand, Debug)]
pub enum AuditAction {
    /// List audit entries
    List {
        /// Filter by orchestrator ID
        #[arg(long)]
        orchestrator: Option<String>,
        /// Filter by watched-session ID
        #[arg(long)]
        session: Option<String>,
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Delete entries older than the retention window
    Cleanup {
        /// Maximum age in days
        #[arg(long, default_value_t = 30)]
        max_age_days: u32,
    },
}
