//! warden-core - Core library for Warden
//!
//! This crate provides shared functionality between the warden CLI and
//! warden-server:
//!
//! - **db**: Direct SQLite database access
//! - **tmux**: Terminal gateway over tmux
//! - **snapshot**: Scrollback capture and hashing
//! - **stall**: Threshold-based stall detection
//! - **command**: Safety validation and command injection
//! - **orchestrator**: Orchestrator lifecycle state machine
//! - **monitor**: Per-orchestrator monitoring loops
//! - **audit**: Append-only audit trail types
//! - **failure**: Tick failure bookkeeping and health

pub mod audit;
pub mod command;
pub mod db;
pub mod error;
pub mod failure;
pub mod monitor;
pub mod orchestrator;
pub mod producer;
pub mod snapshot;
pub mod stall;
pub mod store;
pub mod tmux;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use monitor::MonitoringService;
