//! Monitoring engine: per-orchestrator polling loops.
//!
//! Each monitored orchestrator owns one spawned task that ticks on its
//! configured interval. A tick snapshots every session in scope, runs stall
//! detection, and (when auto-intervention is on) validates and injects a
//! corrective command. Ticks never overlap: the loop awaits each tick and
//! missed deadlines are dropped, not queued.

use crate::audit::{ActionType, NewAuditEntry};
use crate::command::{CommandInjector, InjectionResult};
use crate::db::types::WatchedSession;
use crate::error::{Error, Result};
use crate::failure::{FailureMetrics, FailureTracker};
use crate::orchestrator::{Orchestrator, OrchestratorStatus};
use crate::snapshot::{ScrollbackSnapshot, Snapshotter};
use crate::stall::StallDetector;
use crate::store::{AuditLogStore, CommandProducer, OrchestratorStore, SessionStore};
use crate::tmux::TerminalGateway;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// Scrollback lines captured per snapshot.
pub const DEFAULT_SCROLLBACK_LINES: u32 = 200;

/// Outcome of a direct injection request through the engine.
///
/// Safety rejections and missing sessions are outcomes, not errors: the
/// request was handled, the decision is in the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionOutcome {
    pub success: bool,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub audit_log_id: Option<String>,
    pub error: Option<String>,
}

/// Health snapshot for one orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub orchestrator_id: String,
    pub is_healthy: bool,
    pub monitoring_active: bool,
    pub metrics: FailureMetrics,
}

/// Handle to an active monitoring loop.
struct MonitoringHandle {
    abort: AbortHandle,
    /// Checked inside the loop so an aborted task that already passed its
    /// tick boundary still exits without touching state.
    cancelled: Arc<AtomicBool>,
    user_id: String,
}

/// Resets the tick-in-flight flag even if the tick panics.
struct TickGuard(Arc<AtomicBool>);

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The monitoring and intervention engine.
///
/// Stores and the terminal gateway are trait objects so the engine runs
/// against SQLite and tmux in production and in-memory fakes in tests.
pub struct MonitoringService {
    orchestrators: Arc<dyn OrchestratorStore>,
    sessions: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditLogStore>,
    producer: Arc<dyn CommandProducer>,
    detector: StallDetector,
    injector: CommandInjector,
    tracker: FailureTracker,
    active: RwLock<HashMap<String, MonitoringHandle>>,
    /// Serializes start/stop so concurrent calls cannot double-spawn.
    operation_lock: Mutex<()>,
}

impl MonitoringService {
    pub fn new(
        orchestrators: Arc<dyn OrchestratorStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditLogStore>,
        gateway: Arc<dyn TerminalGateway>,
        producer: Arc<dyn CommandProducer>,
        scrollback_lines: u32,
    ) -> Self {
        Self {
            orchestrators,
            sessions,
            audit,
            producer,
            detector: StallDetector::new(Snapshotter::new(Arc::clone(&gateway), scrollback_lines)),
            injector: CommandInjector::new(gateway),
            tracker: FailureTracker::new(),
            active: RwLock::new(HashMap::new()),
            operation_lock: Mutex::new(()),
        }
    }

    /// Start the monitoring loop for an orchestrator.
    ///
    /// Transitions the orchestrator to `monitoring` and spawns its tick task.
    /// Idempotent: an already-running loop is replaced, not duplicated.
    pub async fn start_monitoring(self: &Arc<Self>, orchestrator_id: &str) -> Result<Orchestrator> {
        let _guard = self.operation_lock.lock().await;

        let orchestrator = self
            .orchestrators
            .get_orchestrator(orchestrator_id)?
            .ok_or_else(|| Error::NotFound(format!("Orchestrator {}", orchestrator_id)))?;

        let next = orchestrator.start_monitoring()?;
        if let std::borrow::Cow::Owned(ref updated) = next {
            self.orchestrators.save_orchestrator(updated)?;
        }
        let orchestrator = next.into_owned();

        self.spawn_loop(&orchestrator).await;

        self.audit.save(NewAuditEntry::new(
            orchestrator_id,
            ActionType::MonitoringStarted,
            None,
            json!({
                "monitoring_interval": orchestrator.monitoring_interval,
                "stall_threshold": orchestrator.stall_threshold,
            }),
        ))?;

        info!(
            orchestrator_id = %orchestrator_id,
            interval = orchestrator.monitoring_interval,
            "Started monitoring"
        );
        Ok(orchestrator)
    }

    /// Stop the monitoring loop and transition the orchestrator to `paused`.
    ///
    /// Clears failure metrics; a later restart begins with a clean record.
    /// Safe to call with no loop running: stopping an orchestrator that is
    /// not in `monitoring` status is a no-op.
    pub async fn stop_monitoring(&self, orchestrator_id: &str) -> Result<Orchestrator> {
        let _guard = self.operation_lock.lock().await;

        self.cancel_loop(orchestrator_id).await;

        let orchestrator = self
            .orchestrators
            .get_orchestrator(orchestrator_id)?
            .ok_or_else(|| Error::NotFound(format!("Orchestrator {}", orchestrator_id)))?;

        if orchestrator.status != OrchestratorStatus::Monitoring {
            self.tracker.clear(orchestrator_id);
            debug!(
                orchestrator_id = %orchestrator_id,
                status = %orchestrator.status,
                "Stop requested with no active monitoring"
            );
            return Ok(orchestrator);
        }

        let next = orchestrator.pause()?;
        if let std::borrow::Cow::Owned(ref updated) = next {
            self.orchestrators.save_orchestrator(updated)?;
        }
        let orchestrator = next.into_owned();

        self.tracker.clear(orchestrator_id);
        self.audit.save(NewAuditEntry::new(
            orchestrator_id,
            ActionType::MonitoringStopped,
            None,
            json!({}),
        ))?;

        info!(orchestrator_id = %orchestrator_id, "Stopped monitoring");
        Ok(orchestrator)
    }

    /// Whether a loop is currently scheduled for this orchestrator.
    pub async fn is_monitoring_active(&self, orchestrator_id: &str) -> bool {
        self.active.read().await.contains_key(orchestrator_id)
    }

    /// Orchestrator ids with active loops, optionally filtered by user.
    pub async fn active_orchestrators(&self, user_id: Option<&str>) -> Vec<String> {
        self.active
            .read()
            .await
            .iter()
            .filter(|(_, handle)| user_id.map_or(true, |u| handle.user_id == u))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Restore loops for orchestrators persisted in `monitoring` status.
    ///
    /// Called once at startup so monitoring survives a process restart.
    pub async fn initialize_monitoring(self: &Arc<Self>) -> Result<usize> {
        let _guard = self.operation_lock.lock().await;

        let monitoring = self.orchestrators.list_monitoring_orchestrators()?;
        let count = monitoring.len();
        for orchestrator in &monitoring {
            self.spawn_loop(orchestrator).await;
            debug!(orchestrator_id = %orchestrator.id, "Restored monitoring loop");
        }

        if count > 0 {
            info!(count, "Restored monitoring for persisted orchestrators");
        }
        Ok(count)
    }

    /// Cancel every loop without changing persisted statuses, so the next
    /// startup recovers them. Used on graceful shutdown.
    pub async fn stop_all(&self) {
        let _guard = self.operation_lock.lock().await;
        let mut active = self.active.write().await;
        for (id, handle) in active.drain() {
            handle.cancelled.store(true, Ordering::SeqCst);
            handle.abort.abort();
            debug!(orchestrator_id = %id, "Cancelled monitoring loop");
        }
    }

    /// Stop monitoring and drop all engine state for an orchestrator.
    /// Called before deletion.
    pub async fn teardown(&self, orchestrator_id: &str) {
        let _guard = self.operation_lock.lock().await;
        self.cancel_loop(orchestrator_id).await;
        self.tracker.clear(orchestrator_id);
    }

    /// Inject a command into a watched session on behalf of an orchestrator.
    ///
    /// Validation rejections and unready sessions come back as unsuccessful
    /// outcomes; `Err` is reserved for unknown ids and storage failures.
    pub async fn inject_command(
        &self,
        orchestrator_id: &str,
        session_id: &str,
        command: &str,
        press_enter: bool,
        reason: Option<&str>,
    ) -> Result<InjectionOutcome> {
        self.orchestrators
            .get_orchestrator(orchestrator_id)?
            .ok_or_else(|| Error::NotFound(format!("Orchestrator {}", orchestrator_id)))?;
        let session = self
            .sessions
            .get_session(session_id)?
            .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))?;

        match self
            .injector
            .inject_command(&session.tmux_session_name, command, press_enter)
            .await
        {
            Ok(InjectionResult { timestamp, .. }) => {
                let entry = self.audit.save(NewAuditEntry::new(
                    orchestrator_id,
                    ActionType::CommandInjected,
                    Some(session_id.to_string()),
                    json!({ "command": command, "source": "direct", "reason": reason }),
                ))?;
                Ok(InjectionOutcome {
                    success: true,
                    timestamp,
                    audit_log_id: Some(entry.id),
                    error: None,
                })
            }
            Err(Error::Validation {
                reason: rejection,
                dangerous,
            }) => {
                let entry = self.audit.save(NewAuditEntry::new(
                    orchestrator_id,
                    ActionType::CommandRejected,
                    Some(session_id.to_string()),
                    json!({ "command": command, "rejection": rejection, "dangerous": dangerous }),
                ))?;
                Ok(InjectionOutcome {
                    success: false,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    audit_log_id: Some(entry.id),
                    error: Some(format!("Command rejected: {}", rejection)),
                })
            }
            Err(Error::SessionNotReady(name)) => Ok(InjectionOutcome {
                success: false,
                timestamp: chrono::Utc::now().timestamp_millis(),
                audit_log_id: None,
                error: Some(format!("Session not ready: {}", name)),
            }),
            Err(err) => Err(err),
        }
    }

    /// Health for one orchestrator. An orchestrator with no recorded ticks
    /// yet is healthy by definition.
    pub async fn get_health(&self, orchestrator_id: &str) -> Result<HealthReport> {
        self.orchestrators
            .get_orchestrator(orchestrator_id)?
            .ok_or_else(|| Error::NotFound(format!("Orchestrator {}", orchestrator_id)))?;

        let metrics = self.tracker.get(orchestrator_id).unwrap_or_default();
        Ok(HealthReport {
            orchestrator_id: orchestrator_id.to_string(),
            is_healthy: metrics.is_healthy(),
            monitoring_active: self.is_monitoring_active(orchestrator_id).await,
            metrics,
        })
    }

    /// Health for every orchestrator with an active loop or recorded metrics.
    pub async fn get_all_health(&self) -> Vec<HealthReport> {
        let active = self.active.read().await;
        let mut reports: HashMap<String, HealthReport> = self
            .tracker
            .get_all()
            .into_iter()
            .map(|(id, metrics)| {
                let report = HealthReport {
                    orchestrator_id: id.clone(),
                    is_healthy: metrics.is_healthy(),
                    monitoring_active: active.contains_key(&id),
                    metrics,
                };
                (id, report)
            })
            .collect();

        for id in active.keys() {
            reports.entry(id.clone()).or_insert_with(|| HealthReport {
                orchestrator_id: id.clone(),
                is_healthy: true,
                monitoring_active: true,
                metrics: FailureMetrics::default(),
            });
        }

        let mut reports: Vec<_> = reports.into_values().collect();
        reports.sort_by(|a, b| a.orchestrator_id.cmp(&b.orchestrator_id));
        reports
    }

    /// Cancel and remove a loop handle if present. Caller holds the
    /// operation lock.
    async fn cancel_loop(&self, orchestrator_id: &str) {
        if let Some(handle) = self.active.write().await.remove(orchestrator_id) {
            handle.cancelled.store(true, Ordering::SeqCst);
            handle.abort.abort();
        }
    }

    /// Spawn the tick loop, replacing any existing one. Caller holds the
    /// operation lock.
    async fn spawn_loop(self: &Arc<Self>, orchestrator: &Orchestrator) {
        self.cancel_loop(&orchestrator.id).await;

        let cancelled = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));
        let service = Arc::clone(self);
        let orchestrator_id = orchestrator.id.clone();
        let interval_secs = orchestrator.monitoring_interval.max(1) as u64;

        let task_cancelled = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so the cadence starts one
            // interval after start.
            interval.tick().await;

            // Previous-generation snapshots, keyed by session id. Dropped
            // with the task, so a restarted loop cold-starts detection.
            let mut prev_snapshots: HashMap<String, ScrollbackSnapshot> = HashMap::new();

            loop {
                interval.tick().await;
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                service
                    .run_tick(&orchestrator_id, &task_cancelled, &running, &mut prev_snapshots)
                    .await;
            }
        });

        self.active.write().await.insert(
            orchestrator.id.clone(),
            MonitoringHandle {
                abort: task.abort_handle(),
                cancelled,
                user_id: orchestrator.user_id.clone(),
            },
        );
    }

    /// One tick: guarded against overlap, metrics recorded at the end.
    async fn run_tick(
        &self,
        orchestrator_id: &str,
        cancelled: &AtomicBool,
        running: &Arc<AtomicBool>,
        prev_snapshots: &mut HashMap<String, ScrollbackSnapshot>,
    ) {
        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(orchestrator_id = %orchestrator_id, "Tick still in flight, dropping");
            return;
        }
        let _guard = TickGuard(Arc::clone(running));

        let result = self.tick_inner(orchestrator_id, prev_snapshots).await;

        // A cancellation racing the tick must not write metrics for a loop
        // that no longer exists.
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        match result {
            Ok(true) => self.tracker.record_success(orchestrator_id),
            Ok(false) => {}
            Err(err) => {
                warn!(orchestrator_id = %orchestrator_id, error = %err, "Tick failed");
                self.tracker.record_failure(orchestrator_id);
            }
        }
    }

    /// Tick body. `Ok(true)` means the tick ran; `Ok(false)` means it was
    /// skipped (orchestrator paused or deleted out from under the loop).
    async fn tick_inner(
        &self,
        orchestrator_id: &str,
        prev_snapshots: &mut HashMap<String, ScrollbackSnapshot>,
    ) -> Result<bool> {
        // Reload each tick so external pause/config changes take effect.
        let orchestrator = match self.orchestrators.get_orchestrator(orchestrator_id)? {
            Some(orch) => orch,
            None => {
                debug!(orchestrator_id = %orchestrator_id, "Orchestrator gone, skipping tick");
                return Ok(false);
            }
        };
        if orchestrator.status != OrchestratorStatus::Monitoring {
            debug!(
                orchestrator_id = %orchestrator_id,
                status = %orchestrator.status,
                "Not in monitoring status, skipping tick"
            );
            return Ok(false);
        }

        let sessions = self.sessions.sessions_in_scope(&orchestrator)?;
        let mut errors: Vec<String> = Vec::new();

        for session in &sessions {
            if let Err(err) = self
                .process_session(&orchestrator, session, prev_snapshots)
                .await
            {
                // One bad session never starves the rest of the scope.
                errors.push(format!("{}: {}", session.name, err));
            }
        }

        if errors.is_empty() {
            Ok(true)
        } else {
            Err(Error::Other(errors.join("; ")))
        }
    }

    /// Stall-check one session and intervene if needed.
    async fn process_session(
        &self,
        orchestrator: &Orchestrator,
        session: &WatchedSession,
        prev_snapshots: &mut HashMap<String, ScrollbackSnapshot>,
    ) -> Result<()> {
        let detection = match self
            .detector
            .detect(
                &session.tmux_session_name,
                prev_snapshots.get(&session.id),
                orchestrator.stall_threshold,
            )
            .await
        {
            Ok(detection) => detection,
            Err(Error::SessionNotReady(_)) => {
                // A vanished session is not a stall and not a tick failure.
                // Drop its baseline so a recreated session cold-starts.
                debug!(session = %session.tmux_session_name, "Session gone, skipping");
                prev_snapshots.remove(&session.id);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let is_stalled = detection.is_stalled;
        let seconds_since_change = detection.seconds_since_change;
        prev_snapshots.insert(session.id.clone(), detection.snapshot);

        if !is_stalled {
            return Ok(());
        }

        info!(
            session = %session.tmux_session_name,
            seconds_since_change,
            "Stall detected"
        );
        self.audit.save(NewAuditEntry::new(
            &orchestrator.id,
            ActionType::StallDetected,
            Some(session.id.clone()),
            json!({
                "session": session.tmux_session_name,
                "seconds_since_change": seconds_since_change,
                "stall_threshold": orchestrator.stall_threshold,
            }),
        ))?;

        if orchestrator.auto_intervention {
            self.intervene(orchestrator, session).await?;
        }
        Ok(())
    }

    /// Produce, validate and inject a corrective command for a stalled
    /// session. The orchestrator sits in `intervening` for the duration.
    async fn intervene(&self, orchestrator: &Orchestrator, session: &WatchedSession) -> Result<()> {
        let intervening = orchestrator.begin_intervention()?;
        if let std::borrow::Cow::Owned(ref updated) = intervening {
            self.orchestrators.save_orchestrator(updated)?;
        }

        let outcome = self.intervene_inner(orchestrator, session).await;

        // Always restore to monitoring, even when the attempt failed.
        let restored = intervening.end_intervention()?;
        if let std::borrow::Cow::Owned(ref updated) = restored {
            self.orchestrators.save_orchestrator(updated)?;
        }

        outcome
    }

    async fn intervene_inner(
        &self,
        orchestrator: &Orchestrator,
        session: &WatchedSession,
    ) -> Result<()> {
        let scrollback = self
            .detector
            .scrollback(&session.tmux_session_name)
            .await
            .unwrap_or_default();

        let command = match self
            .producer
            .candidate(orchestrator, session, &scrollback)
            .await?
        {
            Some(command) => command,
            None => {
                debug!(session = %session.tmux_session_name, "Producer declined to intervene");
                return Ok(());
            }
        };

        match self
            .injector
            .inject_command(&session.tmux_session_name, &command, true)
            .await
        {
            Ok(_) => {
                self.audit.save(NewAuditEntry::new(
                    &orchestrator.id,
                    ActionType::CommandInjected,
                    Some(session.id.clone()),
                    json!({ "command": command, "source": "auto_intervention" }),
                ))?;
                Ok(())
            }
            Err(Error::Validation { reason, dangerous }) => {
                // The producer handed us something unsafe. Audited and
                // absorbed; a rejection is a decision, not a tick failure.
                warn!(
                    session = %session.tmux_session_name,
                    reason = %reason,
                    "Producer command rejected by safety gate"
                );
                self.audit.save(NewAuditEntry::new(
                    &orchestrator.id,
                    ActionType::CommandRejected,
                    Some(session.id.clone()),
                    json!({ "command": command, "reason": reason, "dangerous": dangerous }),
                ))?;
                Ok(())
            }
            Err(Error::SessionNotReady(_)) => {
                debug!(session = %session.tmux_session_name, "Session vanished before injection");
                Ok(())
            }
            Err(err) => {
                error!(
                    session = %session.tmux_session_name,
                    error = %err,
                    "Injection failed"
                );
                Err(err)
            }
        }
    }
}
