//! Orchestrator management routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warden_core::audit::{ActionType, NewAuditEntry};
use warden_core::db::types::NewOrchestrator;
use warden_core::monitor::{HealthReport, InjectionOutcome};
use warden_core::orchestrator::Orchestrator;
use warden_core::store::{AuditLogStore, OrchestratorStore};

use super::error_response;
use crate::state::AppState;

/// Create orchestrator router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/orchestrators",
            get(list_orchestrators).post(create_orchestrator),
        )
        .route(
            "/orchestrators/{id}",
            get(get_orchestrator).delete(delete_orchestrator),
        )
        .route("/orchestrators/{id}/pause", post(pause_orchestrator))
        .route("/orchestrators/{id}/resume", post(resume_orchestrator))
        .route("/orchestrators/{id}/inject", post(inject_command))
        .route("/orchestrators/{id}/health", get(get_health))
        // Monitoring routes
        .route("/orchestrators/{id}/monitoring/start", post(start_monitoring))
        .route("/orchestrators/{id}/monitoring/stop", post(stop_monitoring))
        .route(
            "/orchestrators/{id}/monitoring/status",
            get(get_monitoring_status),
        )
        .route("/monitoring/health", get(get_all_health))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// List a user's orchestrators
pub async fn list_orchestrators(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Orchestrator>>, (StatusCode, String)> {
    let orchestrators = state
        .db
        .list_orchestrators(&query.user_id)
        .map_err(error_response)?;
    Ok(Json(orchestrators))
}

fn default_interval() -> i64 {
    30
}

fn default_threshold() -> i64 {
    300
}

fn default_auto_intervention() -> bool {
    true
}

fn default_press_enter() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateOrchestratorRequest {
    pub user_id: String,
    pub orchestrator_type: String,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub custom_instructions: Option<String>,
    #[serde(default = "default_interval")]
    pub monitoring_interval: i64,
    #[serde(default = "default_threshold")]
    pub stall_threshold: i64,
    #[serde(default = "default_auto_intervention")]
    pub auto_intervention: bool,
}

/// Create a new orchestrator
pub async fn create_orchestrator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrchestratorRequest>,
) -> Result<(StatusCode, Json<Orchestrator>), (StatusCode, String)> {
    let orchestrator = state
        .db
        .create_orchestrator(&NewOrchestrator {
            user_id: req.user_id,
            orchestrator_type: req.orchestrator_type,
            scope_type: req.scope_type,
            scope_id: req.scope_id,
            custom_instructions: req.custom_instructions,
            monitoring_interval: req.monitoring_interval,
            stall_threshold: req.stall_threshold,
            auto_intervention: req.auto_intervention,
        })
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(orchestrator)))
}

fn load_orchestrator(
    state: &AppState,
    id: &str,
) -> Result<Orchestrator, (StatusCode, String)> {
    state
        .db
        .get_orchestrator(id)
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Orchestrator not found".to_string()))
}

/// Get an orchestrator by ID
pub async fn get_orchestrator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Orchestrator>, (StatusCode, String)> {
    Ok(Json(load_orchestrator(&state, &id)?))
}

/// Delete an orchestrator and all its engine state
pub async fn delete_orchestrator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    load_orchestrator(&state, &id)?;

    state.monitoring.teardown(&id).await;
    state.db.delete_orchestrator(&id).map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

fn audit_status_change(
    state: &AppState,
    id: &str,
    from: &str,
    to: &str,
) -> Result<(), (StatusCode, String)> {
    state
        .db
        .save(NewAuditEntry::new(
            id,
            ActionType::StatusChanged,
            None,
            json!({ "from": from, "to": to, "source": "api" }),
        ))
        .map_err(error_response)?;
    Ok(())
}

/// Pause an orchestrator, cancelling its monitoring loop if active
pub async fn pause_orchestrator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Orchestrator>, (StatusCode, String)> {
    let orchestrator = load_orchestrator(&state, &id)?;
    let from = orchestrator.status.as_str();

    let paused = if state.monitoring.is_monitoring_active(&id).await {
        state
            .monitoring
            .stop_monitoring(&id)
            .await
            .map_err(error_response)?
    } else {
        let next = orchestrator.pause().map_err(error_response)?;
        if let std::borrow::Cow::Owned(ref updated) = next {
            state.db.save_orchestrator(updated).map_err(error_response)?;
        }
        next.into_owned()
    };

    if from != paused.status.as_str() {
        audit_status_change(&state, &id, from, paused.status.as_str())?;
    }
    Ok(Json(paused))
}

/// Resume a paused orchestrator back to idle
pub async fn resume_orchestrator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Orchestrator>, (StatusCode, String)> {
    let orchestrator = load_orchestrator(&state, &id)?;
    let from = orchestrator.status.as_str();

    let next = orchestrator.resume().map_err(error_response)?;
    if let std::borrow::Cow::Owned(ref updated) = next {
        state.db.save_orchestrator(updated).map_err(error_response)?;
        audit_status_change(&state, &id, from, updated.status.as_str())?;
    }
    Ok(Json(next.into_owned()))
}

/// Start the monitoring loop
pub async fn start_monitoring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Orchestrator>, (StatusCode, String)> {
    let orchestrator = state
        .monitoring
        .start_monitoring(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(orchestrator))
}

/// Stop the monitoring loop
pub async fn stop_monitoring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Orchestrator>, (StatusCode, String)> {
    let orchestrator = state
        .monitoring
        .stop_monitoring(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(orchestrator))
}

#[derive(Debug, Serialize)]
pub struct MonitoringStatus {
    pub orchestrator_id: String,
    pub status: String,
    pub monitoring_active: bool,
}

/// Current monitoring status for an orchestrator
pub async fn get_monitoring_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MonitoringStatus>, (StatusCode, String)> {
    let orchestrator = load_orchestrator(&state, &id)?;
    Ok(Json(MonitoringStatus {
        orchestrator_id: id.clone(),
        status: orchestrator.status.to_string(),
        monitoring_active: state.monitoring.is_monitoring_active(&id).await,
    }))
}

#[derive(Debug, Deserialize)]
pub struct InjectRequest {
    pub session_id: String,
    pub command: String,
    #[serde(default = "default_press_enter")]
    pub press_enter: bool,
    /// Free-text operator rationale, recorded in the audit entry.
    pub reason: Option<String>,
}

/// Inject a command into a watched session.
///
/// A validation rejection or unready session is a 200 with `success: false`;
/// the decision is recorded in the audit trail either way.
pub async fn inject_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<InjectRequest>,
) -> Result<Json<InjectionOutcome>, (StatusCode, String)> {
    let outcome = state
        .monitoring
        .inject_command(
            &id,
            &req.session_id,
            &req.command,
            req.press_enter,
            req.reason.as_deref(),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}

/// Health for one orchestrator
pub async fn get_health(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HealthReport>, (StatusCode, String)> {
    let report = state.monitoring.get_health(&id).await.map_err(error_response)?;
    Ok(Json(report))
}

/// Health for all orchestrators the engine knows about
pub async fn get_all_health(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<HealthReport>> {
    Json(state.monitoring.get_all_health().await)
}
