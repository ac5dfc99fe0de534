//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use warden_core::tmux;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
    pub active_monitors: usize,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub database: bool,
    pub tmux: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let db_healthy = state.db.ping().is_ok();
    let tmux_healthy = tmux::check_tmux().is_ok();
    let active_monitors = state.monitoring.active_orchestrators(None).await.len();

    let status = if db_healthy && tmux_healthy {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            database: db_healthy,
            tmux: tmux_healthy,
        },
        active_monitors,
    })
}
