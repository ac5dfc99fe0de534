//! One-off local stall check.
//!
//! Captures the session's scrollback, compares the content hash against the
//! snapshot recorded by the previous `check` run, and reports how long the
//! output has been unchanged. State is persisted to disk so repeated
//! invocations accumulate, the same way the server-side loop does between
//! ticks.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use warden_core::snapshot::content_hash;
use warden_core::tmux::{TerminalGateway, TmuxGateway};

use crate::config::Config;

/// Check state persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CheckState {
    /// Per-session snapshot data, keyed by tmux session name.
    sessions: HashMap<String, SessionSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    /// Content hash of scrollback
    hash: String,
    /// When this hash was first seen
    first_seen: DateTime<Utc>,
    /// Last check time
    last_checked: DateTime<Utc>,
}

impl CheckState {
    fn state_path(config: &Config) -> PathBuf {
        config.paths.data_dir.join("check-state.json")
    }

    fn load(config: &Config) -> Result<Self> {
        let path = Self::state_path(config);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&config.paths.data_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::state_path(config), content)?;
        Ok(())
    }
}

pub async fn execute(session: &str, threshold: Option<i64>, config: &Config) -> Result<()> {
    let threshold = threshold.unwrap_or(config.monitoring.stall_threshold_secs);
    let gateway = TmuxGateway::default();

    if !gateway.session_exists(session).await? {
        println!("{}", format!("Session {} not found", session).red());
        return Ok(());
    }

    let content = gateway
        .capture_pane(session, config.monitoring.scrollback_lines)
        .await?;
    let hash = content_hash(&content);
    let now = Utc::now();

    let mut state = CheckState::load(config)?;
    let previous = state.sessions.get(session).cloned();

    let (first_seen, seconds_since_change) = match &previous {
        Some(prev) if prev.hash == hash => {
            let elapsed = now.signed_duration_since(prev.first_seen).num_seconds();
            (prev.first_seen, elapsed)
        }
        _ => (now, 0),
    };

    state.sessions.insert(
        session.to_string(),
        SessionSnapshot {
            hash,
            first_seen,
            last_checked: now,
        },
    );
    state.save(config)?;

    println!("{}", format!("Session: {}", session).cyan().bold());
    println!("  Unchanged for: {}s (threshold {}s)", seconds_since_change, threshold);
    if seconds_since_change >= threshold && previous.is_some() {
        println!("  Verdict: {}", "STALLED".red().bold());
    } else if previous.is_none() {
        println!("  Verdict: {} (baseline recorded, check again later)", "UNKNOWN".yellow());
    } else {
        println!("  Verdict: {}", "ACTIVE".green());
    }

    Ok(())
}
