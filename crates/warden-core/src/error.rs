//! Error types for warden-core.

use thiserror::Error;

/// Result type alias using warden-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for warden operations.
///
/// Callers inside the monitoring loop match on the variant to decide whether
/// an error is absorbed into failure metrics or surfaced to the caller.
#[derive(Error, Debug)]
pub enum Error {
    // Safety gate
    #[error("Command rejected: {reason}")]
    Validation { reason: String, dangerous: bool },

    // Repository lookups
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied")]
    AccessDenied,

    // Target session gone or not accepting input
    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    // State machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    // tmux errors
    #[error("tmux not found. Install tmux to use Warden.")]
    TmuxNotFound,

    #[error("tmux error: {0}")]
    Tmux(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database not found. Set WARDEN_DATABASE_PATH or run `warden-server` once.")]
    DatabaseNotFound,

    #[error("Database lock poisoned")]
    LockPoisoned,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient errors are counted by the failure tracker and never kill
    /// the monitoring loop. Everything else is a caller-facing outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Tmux(_) | Error::Timeout(_) | Error::Io(_) | Error::Database(_)
        )
    }
}
