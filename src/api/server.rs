//! Axum server setup and startup

use std::net::SocketAddr;
use std::path::Path;

use tower_http::cors::{Any, CorsLayer};

use super::routes::create_router;
use super::shared::SharedStateHandle;

/// Run the API server until the shutdown signal flips
pub async fn run_server(
    addr: SocketAddr,
    shared_state: SharedStateHandle,
    static_dir: &Path,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Viewers may be served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(shared_state, static_dir).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Server shutting down gracefully");
        })
        .await
}
