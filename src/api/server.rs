use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{create_job, get_job, health, list_jobs},
    state::AppState,
};
use crate::config::Config;
use crate::queue::WorkQueue;
use crate::store::JobStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(address: SocketAddr, data_path: Option<String>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let mut config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    if let Some(path) = data_path {
        config.server.data_path = path.into();
    }

    let store_path = config.server.data_path.join("store");
    info!(path = %store_path.display(), "Opening job store");
    let store = Arc::new(
        JobStore::open(&store_path).map_err(|e| format!("Failed to open job store: {}", e))?,
    );

    let queue_path = config.server.data_path.join("queue");
    info!(path = %queue_path.display(), "Opening work queue");
    let queue = Arc::new(
        WorkQueue::open(&queue_path).map_err(|e| format!("Failed to open work queue: {}", e))?,
    );

    let state = AppState::new(config, store, queue);

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Careerflow API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the API router. Extracted so tests can drive it without a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
