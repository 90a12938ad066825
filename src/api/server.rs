use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::{ClusterplaneError, Result};

/// Serve `router` until `shutdown` is cancelled, then drain in-flight requests.
pub async fn start_api_server(
    config: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| ClusterplaneError::config(format!("Invalid API address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ClusterplaneError::config_with_source("Failed to bind API server", Box::new(e)))?;

    info!(address = %addr, "Starting HTTP API server");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ClusterplaneError::internal(format!("API server error: {}", e)))?;

    info!("API server shutdown completed");
    Ok(())
}
