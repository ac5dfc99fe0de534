//! warden-server - Warden backend server
//!
//! REST API for orchestrator monitoring and intervention.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_core::Database;

mod config;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("warden_server=info".parse()?))
        .init();

    info!("warden-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Using database at {:?}", config.database_path);

    let db = Database::open_path(&config.database_path)?;
    let listen_addr = config.listen_addr;
    let state = state::AppState::new(config, db);

    // Restore loops for orchestrators that were monitoring before the last
    // shutdown or crash.
    let restored = state.monitoring.initialize_monitoring().await?;
    info!(restored, "Monitoring recovery complete");

    let router = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down...");
    state.monitoring.stop_all().await;

    Ok(())
}
