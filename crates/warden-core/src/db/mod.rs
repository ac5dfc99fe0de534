//! Direct SQLite database access for warden.
//!
//! Database location priority:
//! 1. WARDEN_DATABASE_PATH env var
//! 2. ~/.warden/warden.db

pub mod types;

pub use types::*;

use crate::audit::{ActionType, AuditLogEntry, NewAuditEntry};
use crate::error::{Error, Result};
use crate::orchestrator::{Orchestrator, OrchestratorStatus, OrchestratorType};
use crate::store::{AuditLogStore, OrchestratorStore, SessionStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

const AUDIT_COLUMNS: &str =
    "id, orchestrator_id, action_type, target_session_id, details, created_at";

const ORCHESTRATOR_COLUMNS: &str =
    "id, user_id, type, status, scope_type, scope_id, custom_instructions,
     monitoring_interval, stall_threshold, auto_intervention,
     last_activity_at, created_at, updated_at";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database connection, auto-detecting location, and ensure the
    /// schema exists.
    pub fn open() -> Result<Self> {
        let path = Self::find_database()?;
        Self::open_path(&path)
    }

    /// Open database at a specific path.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Find database file location.
    fn find_database() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("WARDEN_DATABASE_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let dir = home.join(".warden");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("warden.db"))
    }

    /// Create tables and indexes if they do not exist.
    pub fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orchestrator (
                 id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 type TEXT NOT NULL,
                 status TEXT NOT NULL,
                 scope_type TEXT,
                 scope_id TEXT,
                 custom_instructions TEXT,
                 monitoring_interval INTEGER NOT NULL,
                 stall_threshold INTEGER NOT NULL,
                 auto_intervention INTEGER NOT NULL,
                 last_activity_at INTEGER NOT NULL,
                 created_at INTEGER NOT NULL,
                 updated_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_orchestrator_user
                 ON orchestrator(user_id, type);

             CREATE TABLE IF NOT EXISTS watched_session (
                 id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 name TEXT NOT NULL,
                 tmux_session_name TEXT NOT NULL,
                 folder_id TEXT,
                 status TEXT NOT NULL DEFAULT 'active',
                 created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_watched_session_user
                 ON watched_session(user_id, folder_id);

             CREATE TABLE IF NOT EXISTS audit_log (
                 id TEXT PRIMARY KEY,
                 orchestrator_id TEXT NOT NULL,
                 action_type TEXT NOT NULL,
                 target_session_id TEXT,
                 details TEXT NOT NULL,
                 created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_audit_orchestrator
                 ON audit_log(orchestrator_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_audit_created
                 ON audit_log(created_at);",
        )?;
        Ok(())
    }

    /// Check database connectivity.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orchestrator Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new orchestrator in `idle` status.
    ///
    /// Enforces the creation invariants: positive cadence values, at most one
    /// master per user, and a scope for every sub-orchestrator.
    pub fn create_orchestrator(&self, input: &NewOrchestrator) -> Result<Orchestrator> {
        if input.monitoring_interval <= 0 {
            return Err(Error::Other(
                "monitoring_interval must be positive".to_string(),
            ));
        }
        if input.stall_threshold <= 0 {
            return Err(Error::Other("stall_threshold must be positive".to_string()));
        }

        let orchestrator_type = OrchestratorType::from_str(&input.orchestrator_type)?;
        match orchestrator_type {
            OrchestratorType::Master => {
                if self.has_master(&input.user_id)? {
                    return Err(Error::Other(format!(
                        "User {} already has a master orchestrator",
                        input.user_id
                    )));
                }
            }
            OrchestratorType::SubOrchestrator => {
                if input.scope_id.is_none() {
                    return Err(Error::Other(
                        "sub_orchestrator requires a scope_id".to_string(),
                    ));
                }
            }
        }

        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO orchestrator
             (id, user_id, type, status, scope_type, scope_id, custom_instructions,
              monitoring_interval, stall_threshold, auto_intervention,
              last_activity_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'idle', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10)",
            params![
                id,
                input.user_id,
                orchestrator_type.as_str(),
                input.scope_type,
                input.scope_id,
                input.custom_instructions,
                input.monitoring_interval,
                input.stall_threshold,
                input.auto_intervention,
                now,
            ],
        )?;

        Ok(Orchestrator {
            id,
            user_id: input.user_id.clone(),
            orchestrator_type,
            status: OrchestratorStatus::Idle,
            scope_type: input.scope_type.clone(),
            scope_id: input.scope_id.clone(),
            custom_instructions: input.custom_instructions.clone(),
            monitoring_interval: input.monitoring_interval,
            stall_threshold: input.stall_threshold,
            auto_intervention: input.auto_intervention,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get the master orchestrator for a user.
    pub fn get_master_orchestrator(&self, user_id: &str) -> Result<Option<Orchestrator>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORCHESTRATOR_COLUMNS} FROM orchestrator
             WHERE user_id = ?1 AND type = 'master'"
        ))?;

        stmt.query_row(params![user_id], Self::map_orchestrator)
            .optional()?
            .transpose()
    }

    fn map_orchestrator(row: &rusqlite::Row) -> rusqlite::Result<Result<Orchestrator>> {
        let type_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        Ok((|| {
            Ok(Orchestrator {
                id: row.get(0)?,
                user_id: row.get(1)?,
                orchestrator_type: OrchestratorType::from_str(&type_str)?,
                status: OrchestratorStatus::from_str(&status_str)?,
                scope_type: row.get(4)?,
                scope_id: row.get(5)?,
                custom_instructions: row.get(6)?,
                monitoring_interval: row.get(7)?,
                stall_threshold: row.get(8)?,
                auto_intervention: row.get(9)?,
                last_activity_at: row.get(10)?,
                created_at: row.get(11)?,
                updated_at: row.get(12)?,
            })
        })())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Watched Session Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a session for supervision.
    pub fn register_session(&self, input: &NewWatchedSession) -> Result<WatchedSession> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO watched_session
             (id, user_id, name, tmux_session_name, folder_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)",
            params![
                id,
                input.user_id,
                input.name,
                input.tmux_session_name,
                input.folder_id,
                now,
            ],
        )?;

        Ok(WatchedSession {
            id,
            user_id: input.user_id.clone(),
            name: input.name.clone(),
            tmux_session_name: input.tmux_session_name.clone(),
            folder_id: input.folder_id.clone(),
            status: "active".to_string(),
            created_at: now,
        })
    }

    /// List watched sessions for a user.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<WatchedSession>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, tmux_session_name, folder_id, status, created_at
             FROM watched_session
             WHERE user_id = ?1 AND status = 'active'
             ORDER BY created_at",
        )?;

        let sessions = stmt
            .query_map(params![user_id], Self::map_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Mark a watched session closed (stops supervision, keeps the row).
    pub fn close_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "UPDATE watched_session SET status = 'closed' WHERE id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    fn map_session(row: &rusqlite::Row) -> rusqlite::Result<WatchedSession> {
        Ok(WatchedSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            tmux_session_name: row.get(3)?,
            folder_id: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn map_audit(row: &rusqlite::Row) -> rusqlite::Result<Result<AuditLogEntry>> {
        let action_str: String = row.get(2)?;
        Ok((|| {
            Ok(AuditLogEntry {
                id: row.get(0)?,
                orchestrator_id: row.get(1)?,
                action_type: ActionType::from_str(&action_str)?,
                target_session_id: row.get(3)?,
                details: row.get(4)?,
                created_at: row.get(5)?,
            })
        })())
    }

    fn query_audit(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::map_audit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store trait implementations
// ─────────────────────────────────────────────────────────────────────────────

impl OrchestratorStore for Database {
    fn get_orchestrator(&self, id: &str) -> Result<Option<Orchestrator>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORCHESTRATOR_COLUMNS} FROM orchestrator WHERE id = ?1"
        ))?;

        stmt.query_row(params![id], Self::map_orchestrator)
            .optional()?
            .transpose()
    }

    fn list_orchestrators(&self, user_id: &str) -> Result<Vec<Orchestrator>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORCHESTRATOR_COLUMNS} FROM orchestrator
             WHERE user_id = ?1
             ORDER BY type DESC, created_at"
        ))?;

        let rows = stmt
            .query_map(params![user_id], Self::map_orchestrator)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    fn list_monitoring_orchestrators(&self) -> Result<Vec<Orchestrator>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORCHESTRATOR_COLUMNS} FROM orchestrator WHERE status = 'monitoring'"
        ))?;

        let rows = stmt
            .query_map([], Self::map_orchestrator)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    fn has_master(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orchestrator WHERE user_id = ?1 AND type = 'master'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn save_orchestrator(&self, orchestrator: &Orchestrator) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let changed = conn.execute(
            "UPDATE orchestrator
             SET status = ?1, last_activity_at = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                orchestrator.status.as_str(),
                orchestrator.last_activity_at,
                orchestrator.updated_at,
                orchestrator.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "Orchestrator {}",
                orchestrator.id
            )));
        }
        Ok(())
    }

    fn delete_orchestrator(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute("DELETE FROM orchestrator WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn get_session(&self, id: &str) -> Result<Option<WatchedSession>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, tmux_session_name, folder_id, status, created_at
             FROM watched_session WHERE id = ?1",
        )?;

        Ok(stmt
            .query_row(params![id], Self::map_session)
            .optional()?)
    }

    fn sessions_in_scope(&self, orchestrator: &Orchestrator) -> Result<Vec<WatchedSession>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let sessions = if let Some(folder_id) = orchestrator.scope_id.as_deref() {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, tmux_session_name, folder_id, status, created_at
                 FROM watched_session
                 WHERE user_id = ?1 AND folder_id = ?2 AND status = 'active'
                 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map(
                    params![orchestrator.user_id, folder_id],
                    Self::map_session,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, tmux_session_name, folder_id, status, created_at
                 FROM watched_session
                 WHERE user_id = ?1 AND status = 'active'
                 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map(params![orchestrator.user_id], Self::map_session)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        Ok(sessions)
    }
}

impl AuditLogStore for Database {
    fn save(&self, entry: NewAuditEntry) -> Result<AuditLogEntry> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let details = entry.details.to_string();

        conn.execute(
            "INSERT INTO audit_log
             (id, orchestrator_id, action_type, target_session_id, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                entry.orchestrator_id,
                entry.action_type.as_str(),
                entry.target_session_id,
                details,
                now,
            ],
        )?;

        Ok(AuditLogEntry {
            id,
            orchestrator_id: entry.orchestrator_id,
            action_type: entry.action_type,
            target_session_id: entry.target_session_id,
            details,
            created_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<AuditLogEntry>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE id = ?1"
        ))?;

        stmt.query_row(params![id], Self::map_audit)
            .optional()?
            .transpose()
    }

    fn find_by_orchestrator_id(&self, orchestrator_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE orchestrator_id = ?1 ORDER BY created_at DESC"
            ),
            params![orchestrator_id],
        )
    }

    fn find_by_session_id(&self, session_id: &str) -> Result<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE target_session_id = ?1 ORDER BY created_at DESC"
            ),
            params![session_id],
        )
    }

    fn find_by_action_type(&self, action_type: ActionType) -> Result<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE action_type = ?1 ORDER BY created_at DESC"
            ),
            params![action_type.as_str()],
        )
    }

    fn find_by_time_range(&self, from_ms: i64, to_ms: i64) -> Result<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE created_at >= ?1 AND created_at < ?2 ORDER BY created_at"
            ),
            params![from_ms, to_ms],
        )
    }

    fn find_recent_by_orchestrator_id(
        &self,
        orchestrator_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>> {
        self.query_audit(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE orchestrator_id = ?1 ORDER BY created_at DESC LIMIT ?2"
            ),
            params![orchestrator_id, limit],
        )
    }

    fn delete_older_than(&self, cutoff_ms: i64) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let deleted = conn.execute(
            "DELETE FROM audit_log WHERE created_at < ?1",
            params![cutoff_ms],
        )?;
        Ok(deleted)
    }
}
