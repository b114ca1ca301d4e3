//! BigBox firmware builder server.
//!
//! Exposes the build/flash pipeline, profile storage and dependency checks
//! over HTTP, and pushes pipeline output to browsers over a WebSocket.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Routes**: HTTP and WebSocket handlers, each calling one core operation
//! - **Notifier**: broadcast channel fanning plugin messages out to clients
//! - **Protocol**: request and response bodies

pub mod error;
pub mod notifier;
pub mod protocol;
pub mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bigbox_core::{DeviceConnection, FirmwareConfig};

pub use error::{ServerError, ServerResult};
pub use notifier::BroadcastNotifier;
pub use protocol::{DependencyStatus, MakeBody, ProfileList};
pub use routes::{AppState, create_router};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Start the server and run until Ctrl+C.
pub async fn serve(
    firmware: FirmwareConfig,
    config: ServerConfig,
    device: Arc<dyn DeviceConnection>,
) -> ServerResult<()> {
    firmware.dirs().ensure()?;

    let state = Arc::new(AppState::new(firmware, device));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::Io {
            path: PathBuf::new(),
            message: format!("Invalid address: {}:{}", config.host, config.port),
        })?;

    tracing::info!("Starting BigBox firmware server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
