//! Watched session registry routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use warden_core::db::types::{NewWatchedSession, WatchedSession};
use warden_core::store::SessionStore;

use super::error_response;
use crate::state::AppState;

/// Create session router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(register_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/close", post(close_session))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// List a user's active watched sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<WatchedSession>>, (StatusCode, String)> {
    let sessions = state.db.list_sessions(&query.user_id).map_err(error_response)?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct RegisterSessionRequest {
    pub user_id: String,
    pub name: String,
    pub tmux_session_name: String,
    pub folder_id: Option<String>,
}

/// Register a tmux session for supervision
pub async fn register_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterSessionRequest>,
) -> Result<(StatusCode, Json<WatchedSession>), (StatusCode, String)> {
    let session = state
        .db
        .register_session(&NewWatchedSession {
            user_id: req.user_id,
            name: req.name,
            tmux_session_name: req.tmux_session_name,
            folder_id: req.folder_id,
        })
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Get a watched session by ID
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WatchedSession>, (StatusCode, String)> {
    let session = state
        .db
        .get_session(&id)
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;
    Ok(Json(session))
}

/// Remove a session from supervision (the row is kept for audit joins)
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .db
        .get_session(&id)
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;

    state.db.close_session(&id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
