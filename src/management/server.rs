//! Management API Server

use super::{api::ManagementApi, handlers::AppState, types::ApiAuthConfig};
use crate::Result;
use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// Management API server
pub struct ManagementServer {
    bind_addr: SocketAddr,
    app_state: AppState,
    auth_config: ApiAuthConfig,
}

impl ManagementServer {
    /// Create a new management server
    pub fn new(bind_addr: SocketAddr, app_state: AppState, auth_config: ApiAuthConfig) -> Self {
        Self {
            bind_addr,
            app_state,
            auth_config,
        }
    }

    /// Serve until the shutdown signal fires
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting management API server on {}", self.bind_addr);

        let app = ManagementApi::create_router(self.app_state, self.auth_config);

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind management API server to {}", self.bind_addr))?;

        info!("Management API server listening on {}", self.bind_addr);

        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
            info!("Management API server shutting down");
        };

        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            error!("Management API server error: {}", e);
            return Err(e.into());
        }

        Ok(())
    }

    /// Create a router for testing
    pub fn create_test_router(&self) -> Router {
        ManagementApi::create_router(self.app_state.clone(), self.auth_config.clone())
    }
}
