//! API route modules.

pub mod audit;
pub mod health;
pub mod orchestrators;
pub mod sessions;

use axum::http::StatusCode;
use axum::{routing::get, Router};
use std::sync::Arc;
use warden_core::Error;

use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .merge(orchestrators::router())
        .merge(sessions::router())
        .merge(audit::router());

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// Map a core error onto an HTTP response.
pub(crate) fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::Validation { .. } | Error::Other(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AccessDenied => StatusCode::FORBIDDEN,
        Error::SessionNotReady(_) | Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
