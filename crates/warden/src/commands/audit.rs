//! Audit trail commands.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use colored::Colorize;
use warden_core::audit::{ActionType, AuditLogEntry};
use warden_core::store::AuditLogStore;
use warden_core::Database;

use crate::cli::{AuditAction, AuditCommand};
use crate::config::Config;

pub async fn execute(cmd: AuditCommand, _config: &Config) -> Result<()> {
    let db = Database::open()?;

    match cmd.action {
        AuditAction::List {
            orchestrator,
            session,
            limit,
        } => list(&db, orchestrator.as_deref(), session.as_deref(), limit),
        AuditAction::Cleanup { max_age_days } => cleanup(&db, max_age_days),
    }
}

fn list(
    db: &Database,
    orchestrator: Option<&str>,
    session: Option<&str>,
    limit: u32,
) -> Result<()> {
    let entries = match (orchestrator, session) {
        (Some(id), _) => db.find_recent_by_orchestrator_id(id, limit)?,
        (None, Some(id)) => {
            let mut entries = db.find_by_session_id(id)?;
            entries.truncate(limit as usize);
            entries
        }
        (None, None) => {
            println!("{}", "Provide --orchestrator or --session".yellow());
            return Ok(());
        }
    };

    if entries.is_empty() {
        println!("No audit entries found");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &AuditLogEntry) {
    let when = Utc
        .timestamp_millis_opt(entry.created_at)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| entry.created_at.to_string());

    let action = match entry.action_type {
        ActionType::StallDetected => entry.action_type.to_string().yellow(),
        ActionType::CommandInjected => entry.action_type.to_string().green(),
        ActionType::CommandRejected => entry.action_type.to_string().red(),
        _ => entry.action_type.to_string().normal(),
    };

    let target = entry
        .target_session_id
        .as_deref()
        .map(|s| format!(" session={}", s))
        .unwrap_or_default();

    println!("{} {}{} {}", when.dimmed(), action, target.cyan(), entry.details);
}

fn cleanup(db: &Database, max_age_days: u32) -> Result<()> {
    let cutoff = Utc::now().timestamp_millis() - i64::from(max_age_days) * 86_400_000;
    let deleted = db.delete_older_than(cutoff)?;
    println!(
        "{}",
        format!("✓ Deleted {} entries older than {} days", deleted, max_age_days).green()
    );
    Ok(())
}
