//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::scheduler::Sampler;
use crate::store::Store;

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub sampler: Arc<Sampler>,
}

/// Web server for StatusBoard.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, sampler: Arc<Sampler>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                sampler,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/health", get(handlers::handle_health))
            .route("/health/{service}", get(handlers::handle_health_service))
            .route("/status", get(handlers::handle_status))
            .route("/history", get(handlers::handle_history))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handlers::handle_panic))
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
