//! Audit trail query routes.
//!
//! The trail is append-only; the only mutation exposed here is age-based
//! retention cleanup.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use warden_core::audit::{ActionType, AuditLogEntry};
use warden_core::store::AuditLogStore;

use super::error_response;
use crate::state::AppState;

/// Create audit router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/audit", get(query_audit))
        .route("/audit/cleanup", post(cleanup_audit))
        .route("/audit/{id}", get(get_entry))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub orchestrator_id: Option<String>,
    pub session_id: Option<String>,
    pub action_type: Option<String>,
    /// Milliseconds since epoch, inclusive.
    pub from: Option<i64>,
    /// Milliseconds since epoch, exclusive.
    pub to: Option<i64>,
    pub limit: Option<u32>,
}

/// Query audit entries by one filter dimension.
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, (StatusCode, String)> {
    let entries = if let Some(orchestrator_id) = &query.orchestrator_id {
        match query.limit {
            Some(limit) => state
                .db
                .find_recent_by_orchestrator_id(orchestrator_id, limit)
                .map_err(error_response)?,
            None => state
                .db
                .find_by_orchestrator_id(orchestrator_id)
                .map_err(error_response)?,
        }
    } else if let Some(session_id) = &query.session_id {
        state.db.find_by_session_id(session_id).map_err(error_response)?
    } else if let Some(action_type) = &query.action_type {
        let action = ActionType::from_str(action_type).map_err(error_response)?;
        state.db.find_by_action_type(action).map_err(error_response)?
    } else if let (Some(from), Some(to)) = (query.from, query.to) {
        state.db.find_by_time_range(from, to).map_err(error_response)?
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Provide orchestrator_id, session_id, action_type, or from/to".to_string(),
        ));
    };

    Ok(Json(entries))
}

/// Get one audit entry by ID
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AuditLogEntry>, (StatusCode, String)> {
    let entry = state
        .db
        .get(&id)
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Audit entry not found".to_string()))?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// Entries older than this many days are deleted.
    pub max_age_days: u32,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: usize,
}

/// Delete audit entries older than the retention window
pub async fn cleanup_audit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, (StatusCode, String)> {
    let cutoff =
        chrono::Utc::now().timestamp_millis() - i64::from(req.max_age_days) * 86_400_000;
    let deleted = state.db.delete_older_than(cutoff).map_err(error_response)?;
    Ok(Json(CleanupResponse { deleted }))
}
