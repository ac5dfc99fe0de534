//! Orchestrator domain type and its lifecycle state machine.
//!
//! Transition methods are pure: they return a new value and never mutate.
//! A no-op transition returns `Cow::Borrowed(self)` so callers can skip the
//! redundant persistence write with a cheap identity check.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Orchestrator kind: master watches the whole user, a sub-orchestrator
/// watches exactly one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorType {
    Master,
    SubOrchestrator,
}

impl OrchestratorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorType::Master => "master",
            OrchestratorType::SubOrchestrator => "sub_orchestrator",
        }
    }
}

impl FromStr for OrchestratorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "master" => Ok(OrchestratorType::Master),
            "sub_orchestrator" => Ok(OrchestratorType::SubOrchestrator),
            other => Err(Error::Other(format!("Unknown orchestrator type: {}", other))),
        }
    }
}

impl fmt::Display for OrchestratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status.
///
/// `Intervening` is transient: set for the duration of an in-flight
/// injection within a tick and restored to `Monitoring` when the attempt
/// finishes. `Error` is reserved for unrecoverable misconfiguration; normal
/// tick failures go to the failure tracker, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorStatus {
    Idle,
    Monitoring,
    Intervening,
    Paused,
    Error,
}

impl OrchestratorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorStatus::Idle => "idle",
            OrchestratorStatus::Monitoring => "monitoring",
            OrchestratorStatus::Intervening => "intervening",
            OrchestratorStatus::Paused => "paused",
            OrchestratorStatus::Error => "error",
        }
    }
}

impl FromStr for OrchestratorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(OrchestratorStatus::Idle),
            "monitoring" => Ok(OrchestratorStatus::Monitoring),
            "intervening" => Ok(OrchestratorStatus::Intervening),
            "paused" => Ok(OrchestratorStatus::Paused),
            "error" => Ok(OrchestratorStatus::Error),
            other => Err(Error::Other(format!("Unknown orchestrator status: {}", other))),
        }
    }
}

impl fmt::Display for OrchestratorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supervising entity bound to one user.
///
/// `monitoring_interval` and `stall_threshold` are immutable after creation;
/// changing cadence means delete and recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestrator {
    pub id: String,
    pub user_id: String,
    pub orchestrator_type: OrchestratorType,
    pub status: OrchestratorStatus,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    /// Free text handed to the external command-candidate producer.
    pub custom_instructions: Option<String>,
    /// Seconds between ticks, > 0.
    pub monitoring_interval: i64,
    /// Seconds of unchanged scrollback before a session counts as stalled.
    pub stall_threshold: i64,
    pub auto_intervention: bool,
    /// Milliseconds since epoch.
    pub last_activity_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Orchestrator {
    fn with_status(&self, status: OrchestratorStatus) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.updated_at = chrono::Utc::now().timestamp_millis();
        next
    }

    fn invalid(&self, to: OrchestratorStatus) -> Error {
        Error::InvalidTransition {
            from: self.status.as_str(),
            to: to.as_str(),
        }
    }

    /// `idle` | `paused` -> `monitoring`. Already monitoring is a no-op.
    pub fn start_monitoring(&self) -> Result<Cow<'_, Self>> {
        match self.status {
            OrchestratorStatus::Monitoring => Ok(Cow::Borrowed(self)),
            OrchestratorStatus::Idle | OrchestratorStatus::Paused => {
                Ok(Cow::Owned(self.with_status(OrchestratorStatus::Monitoring)))
            }
            _ => Err(self.invalid(OrchestratorStatus::Monitoring)),
        }
    }

    /// `monitoring` -> `paused`. Already paused is a no-op. The caller is
    /// responsible for cancelling the scheduler entry.
    pub fn pause(&self) -> Result<Cow<'_, Self>> {
        match self.status {
            OrchestratorStatus::Paused => Ok(Cow::Borrowed(self)),
            OrchestratorStatus::Monitoring => {
                Ok(Cow::Owned(self.with_status(OrchestratorStatus::Paused)))
            }
            _ => Err(self.invalid(OrchestratorStatus::Paused)),
        }
    }

    /// `paused` -> `idle`. Already idle is a no-op; whether to restart the
    /// scheduler is the caller's decision.
    pub fn resume(&self) -> Result<Cow<'_, Self>> {
        match self.status {
            OrchestratorStatus::Idle => Ok(Cow::Borrowed(self)),
            OrchestratorStatus::Paused => {
                Ok(Cow::Owned(self.with_status(OrchestratorStatus::Idle)))
            }
            _ => Err(self.invalid(OrchestratorStatus::Idle)),
        }
    }

    /// `monitoring` -> `intervening`, for the duration of one injection.
    pub fn begin_intervention(&self) -> Result<Cow<'_, Self>> {
        match self.status {
            OrchestratorStatus::Intervening => Ok(Cow::Borrowed(self)),
            OrchestratorStatus::Monitoring => {
                Ok(Cow::Owned(self.with_status(OrchestratorStatus::Intervening)))
            }
            _ => Err(self.invalid(OrchestratorStatus::Intervening)),
        }
    }

    /// `intervening` -> `monitoring`, regardless of injection outcome.
    pub fn end_intervention(&self) -> Result<Cow<'_, Self>> {
        match self.status {
            OrchestratorStatus::Monitoring => Ok(Cow::Borrowed(self)),
            OrchestratorStatus::Intervening => {
                Ok(Cow::Owned(self.with_status(OrchestratorStatus::Monitoring)))
            }
            _ => Err(self.invalid(OrchestratorStatus::Monitoring)),
        }
    }
}
