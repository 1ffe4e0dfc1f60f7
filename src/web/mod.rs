//! Web server exposing the live snapshot and history endpoints.

mod handlers;

pub use handlers::*;

use crate::db::Store;
use crate::snapshot::SnapshotStore;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Absent when the database was unavailable at startup.
    pub store: Option<Arc<Store>>,
    pub snapshots: Arc<SnapshotStore>,
}

/// API server for pulsewatch.
pub struct Server {
    http_port: u16,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(http_port: u16, store: Option<Arc<Store>>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            http_port,
            state: AppState { store, snapshots },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/healthz", get(handlers::handle_healthz))
            .route("/status", get(handlers::handle_status))
            .route("/api/uptime", get(handlers::handle_uptime))
            .route("/api/uptime/all", get(handlers::handle_uptime_all))
            .route("/api/incidents", get(handlers::handle_incidents))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` fires.
    pub async fn start(
        &self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        Ok(())
    }
}
