//! AutoML Agent HTTP server
//!
//! Thin axum surface over [`crate::service::AutoMlService`]: multipart
//! training, single-row prediction and model listing.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{PredictRequest, PredictResponse, NO_FILE_MESSAGE};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::AppConfig;

/// Start the server with the given configuration
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        uploads_dir = %config.uploads_dir.display(),
        models_dir = %config.models_dir.display(),
        "Initializing server directories"
    );
    config.ensure_dirs()?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config));
    info!(
        address = %addr,
        agent_enabled = state.service.has_agent(),
        max_upload_size_mb = state.config.max_upload_size / 1024 / 1024,
        "AutoML Agent server starting"
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
