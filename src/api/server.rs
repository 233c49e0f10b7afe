use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{services, state::AppState};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/downloads",
            post(services::start_download).get(services::list_downloads),
        )
        .route("/downloads/{job_id}", delete(services::cancel_download))
        .route("/events", get(services::event_stream))
        .route("/info", get(services::get_info))
        .route(
            "/history",
            get(services::get_history).delete(services::clear_history),
        )
        .route(
            "/settings",
            get(services::get_settings).put(services::save_settings),
        )
        .route("/settings/folder", post(services::pick_folder))
        .route("/health", get(services::health))
        .with_state(state)
        // gzip request bodies are inflated before handlers see them
        .layer(RequestDecompressionLayer::new())
}

/// Serve until Ctrl+C or SIGTERM
pub async fn run(state: AppState) -> Result<(), AnyError> {
    let address = state.config.server.bind_addr;
    info!(
        data_dir = %state.config.server.data_dir.display(),
        "Download service starting"
    );

    let listener = TcpListener::bind(address).await?;
    info!(%address, "clipfetch API listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
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
