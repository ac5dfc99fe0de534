//! Database input types for warden-core.

use serde::{Deserialize, Serialize};

/// A terminal session registered for supervision.
///
/// Session lifecycle itself is owned elsewhere; this registry only binds a
/// user/folder scope to a tmux session name so orchestrators can resolve
/// what they watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedSession {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub tmux_session_name: String,
    pub folder_id: Option<String>,
    pub status: String,
    pub created_at: i64,
}

/// Input for registering a watched session.
#[derive(Debug, Clone)]
pub struct NewWatchedSession {
    pub user_id: String,
    pub name: String,
    pub tmux_session_name: String,
    pub folder_id: Option<String>,
}

/// Input for creating a new orchestrator.
#[derive(Debug, Clone)]
pub struct NewOrchestrator {
    pub user_id: String,
    /// "master" or "sub_orchestrator"
    pub orchestrator_type: String,
    /// "folder" or None
    pub scope_type: Option<String>,
    /// folder_id or None
    pub scope_id: Option<String>,
    pub custom_instructions: Option<String>,
    /// Seconds between ticks, > 0.
    pub monitoring_interval: i64,
    /// Seconds, > 0. Should be >= monitoring_interval.
    pub stall_threshold: i64,
    pub auto_intervention: bool,
}
