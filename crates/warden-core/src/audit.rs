//! Audit log types - the immutable trail of supervisory decisions.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of supervisory action recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    StatusChanged,
    StallDetected,
    CommandInjected,
    CommandRejected,
    MonitoringStarted,
    MonitoringStopped,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::StatusChanged => "status_changed",
            ActionType::StallDetected => "stall_detected",
            ActionType::CommandInjected => "command_injected",
            ActionType::CommandRejected => "command_rejected",
            ActionType::MonitoringStarted => "monitoring_started",
            ActionType::MonitoringStopped => "monitoring_stopped",
        }
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "status_changed" => Ok(ActionType::StatusChanged),
            "stall_detected" => Ok(ActionType::StallDetected),
            "command_injected" => Ok(ActionType::CommandInjected),
            "command_rejected" => Ok(ActionType::CommandRejected),
            "monitoring_started" => Ok(ActionType::MonitoringStarted),
            "monitoring_stopped" => Ok(ActionType::MonitoringStopped),
            other => Err(Error::Other(format!("Unknown action type: {}", other))),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a supervisory action.
///
/// Immutable once saved; the only destructive operation permitted is bulk
/// retention deletion by age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub orchestrator_id: String,
    pub action_type: ActionType,
    pub target_session_id: Option<String>,
    /// Structured JSON payload.
    pub details: String,
    /// Milliseconds since epoch.
    pub created_at: i64,
}

/// Input for appending a new audit entry.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub orchestrator_id: String,
    pub action_type: ActionType,
    pub target_session_id: Option<String>,
    pub details: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(
        orchestrator_id: impl Into<String>,
        action_type: ActionType,
        target_session_id: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            orchestrator_id: orchestrator_id.into(),
            action_type,
            target_session_id,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip() {
        for action in [
            ActionType::StatusChanged,
            ActionType::StallDetected,
            ActionType::CommandInjected,
            ActionType::CommandRejected,
            ActionType::MonitoringStarted,
            ActionType::MonitoringStopped,
        ] {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
        assert!("mutate_entry".parse::<ActionType>().is_err());
    }
}
