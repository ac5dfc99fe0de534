//! System status dashboard command.
//!
//! Provides a view of the supervision system:
//! - Orchestrators and their lifecycle status
//! - Watched sessions and whether their tmux sessions are alive
//! - Component health (database, tmux)
//!
//! Supports JSON output for programmatic use.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use warden_core::orchestrator::OrchestratorStatus;
use warden_core::store::OrchestratorStore;
use warden_core::tmux::{self, TerminalGateway, TmuxGateway};
use warden_core::Database;

use crate::config::Config;

/// Full system status for JSON output.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub timestamp: String,
    pub orchestrators: Vec<OrchestratorStatusLine>,
    pub sessions: Vec<SessionStatusLine>,
    pub health: HealthStatusLine,
}

#[derive(Debug, Serialize)]
pub struct OrchestratorStatusLine {
    pub id: String,
    pub orchestrator_type: String,
    pub status: String,
    pub monitoring_interval: i64,
    pub stall_threshold: i64,
    pub auto_intervention: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusLine {
    pub name: String,
    pub tmux_session_name: String,
    pub alive: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthStatusLine {
    pub database: bool,
    pub tmux: bool,
}

pub async fn execute(json: bool, config: &Config) -> Result<()> {
    let db = Database::open()?;
    let gateway = TmuxGateway::default();

    let orchestrators = db
        .list_orchestrators(&config.user_id)?
        .into_iter()
        .map(|o| OrchestratorStatusLine {
            id: o.id,
            orchestrator_type: o.orchestrator_type.to_string(),
            status: o.status.to_string(),
            monitoring_interval: o.monitoring_interval,
            stall_threshold: o.stall_threshold,
            auto_intervention: o.auto_intervention,
        })
        .collect::<Vec<_>>();

    let mut sessions = Vec::new();
    for session in db.list_sessions(&config.user_id)? {
        let alive = gateway
            .session_exists(&session.tmux_session_name)
            .await
            .unwrap_or(false);
        sessions.push(SessionStatusLine {
            name: session.name,
            tmux_session_name: session.tmux_session_name,
            alive,
        });
    }

    let status = SystemStatus {
        timestamp: chrono::Utc::now().to_rfc3339(),
        orchestrators,
        sessions,
        health: HealthStatusLine {
            database: db.ping().is_ok(),
            tmux: tmux::check_tmux().is_ok(),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Warden Status".cyan().bold());
    println!("{}", "─".repeat(60));

    println!("{}", "Orchestrators:".cyan());
    if status.orchestrators.is_empty() {
        println!("  (none)");
    }
    for orch in &status.orchestrators {
        let status_colored = match orch.status.parse::<OrchestratorStatus>() {
            Ok(OrchestratorStatus::Monitoring) => orch.status.green(),
            Ok(OrchestratorStatus::Intervening) => orch.status.yellow(),
            Ok(OrchestratorStatus::Error) => orch.status.red(),
            _ => orch.status.normal(),
        };
        println!(
            "  {} [{}] {} (interval {}s, threshold {}s{})",
            &orch.id[..8.min(orch.id.len())],
            orch.orchestrator_type,
            status_colored,
            orch.monitoring_interval,
            orch.stall_threshold,
            if orch.auto_intervention {
                ", auto"
            } else {
                ""
            },
        );
    }

    println!();
    println!("{}", "Sessions:".cyan());
    if status.sessions.is_empty() {
        println!("  (none)");
    }
    for session in &status.sessions {
        let alive = if session.alive {
            "RUNNING".green()
        } else {
            "GONE".red()
        };
        println!("  {} ({}) {}", session.name, session.tmux_session_name, alive);
    }

    println!();
    println!("{}", "Health:".cyan());
    println!(
        "  Database: {}",
        if status.health.database { "ok".green() } else { "down".red() }
    );
    println!(
        "  tmux: {}",
        if status.health.tmux { "ok".green() } else { "missing".red() }
    );

    Ok(())
}
