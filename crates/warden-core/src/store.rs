//! Repository ports consumed by the monitoring engine.
//!
//! The engine is constructed against these traits so tests substitute
//! in-memory fakes without touching SQLite or tmux. `db::Database` is the
//! production implementation.

use crate::audit::{ActionType, AuditLogEntry, NewAuditEntry};
use crate::db::types::WatchedSession;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use async_trait::async_trait;

/// Orchestrator persistence port.
pub trait OrchestratorStore: Send + Sync {
    fn get_orchestrator(&self, id: &str) -> Result<Option<Orchestrator>>;

    fn list_orchestrators(&self, user_id: &str) -> Result<Vec<Orchestrator>>;

    /// Orchestrators persisted in `monitoring` status, for startup recovery.
    fn list_monitoring_orchestrators(&self) -> Result<Vec<Orchestrator>>;

    fn has_master(&self, user_id: &str) -> Result<bool>;

    /// Persist a transitioned orchestrator value (status + updated_at).
    fn save_orchestrator(&self, orchestrator: &Orchestrator) -> Result<()>;

    fn delete_orchestrator(&self, id: &str) -> Result<()>;
}

/// Watched-session registry port, used to resolve an orchestrator's scope to
/// concrete tmux session names.
pub trait SessionStore: Send + Sync {
    fn get_session(&self, id: &str) -> Result<Option<WatchedSession>>;

    /// Sessions the orchestrator watches: all of the user's active sessions
    /// for a master, the scope folder's sessions for a sub-orchestrator.
    fn sessions_in_scope(&self, orchestrator: &Orchestrator) -> Result<Vec<WatchedSession>>;
}

/// Audit trail port. Append-only except for age-based retention deletion.
pub trait AuditLogStore: Send + Sync {
    fn save(&self, entry: NewAuditEntry) -> Result<AuditLogEntry>;

    fn get(&self, id: &str) -> Result<Option<AuditLogEntry>>;

    fn find_by_orchestrator_id(&self, orchestrator_id: &str) -> Result<Vec<AuditLogEntry>>;

    fn find_by_session_id(&self, session_id: &str) -> Result<Vec<AuditLogEntry>>;

    fn find_by_action_type(&self, action_type: ActionType) -> Result<Vec<AuditLogEntry>>;

    /// Entries with `from_ms <= created_at < to_ms`.
    fn find_by_time_range(&self, from_ms: i64, to_ms: i64) -> Result<Vec<AuditLogEntry>>;

    fn find_recent_by_orchestrator_id(
        &self,
        orchestrator_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>>;

    /// The sole retention mechanism. Returns the number of deleted rows.
    fn delete_older_than(&self, cutoff_ms: i64) -> Result<usize>;
}

/// External policy that proposes a corrective command for a stalled session.
///
/// The engine only validates and injects what it is handed; producing
/// nothing means no intervention this tick.
#[async_trait]
pub trait CommandProducer: Send + Sync {
    async fn candidate(
        &self,
        orchestrator: &Orchestrator,
        session: &WatchedSession,
        scrollback: &str,
    ) -> Result<Option<String>>;
}
