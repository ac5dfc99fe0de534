//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};
use warden_core::producer::NudgeProducer;
use warden_core::store::{AuditLogStore, OrchestratorStore, SessionStore};
use warden_core::tmux::{TerminalGateway, TmuxGateway};
use warden_core::{Database, MonitoringService};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Config,
    /// Database connection
    pub db: Arc<Database>,
    /// Monitoring and intervention engine
    pub monitoring: Arc<MonitoringService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Arc<Self> {
        let db = Arc::new(db);
        let gateway: Arc<dyn TerminalGateway> =
            Arc::new(TmuxGateway::new(Duration::from_secs(config.call_timeout_secs)));
        let monitoring = Arc::new(MonitoringService::new(
            Arc::clone(&db) as Arc<dyn OrchestratorStore>,
            Arc::clone(&db) as Arc<dyn SessionStore>,
            Arc::clone(&db) as Arc<dyn AuditLogStore>,
            gateway,
            Arc::new(NudgeProducer),
            config.scrollback_lines,
        ));

        Arc::new(Self {
            config,
            db,
            monitoring,
            start_time: Instant::now(),
        })
    }
}
