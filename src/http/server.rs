//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the request pipeline in an axum Router
//! - Wire up transport middleware (tracing, request ID)
//! - Bind server to listener with connect info
//! - Stop accepting and drain on shutdown

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::http::request::request_id_layers;
use crate::pipeline::Pipeline;

/// HTTP server hosting one request pipeline.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        let router = Self::build_router(pipeline);
        Self { router, config }
    }

    /// Build the Axum router with all transport layers.
    ///
    /// The request deadline is enforced by the pipeline itself, so a
    /// timed-out request still passes through every response hook.
    fn build_router(pipeline: Pipeline) -> Router {
        let (set_request_id, propagate_request_id) = request_id_layers();

        Router::new()
            .fallback_service(pipeline)
            .layer(propagate_request_id)
            .layer(set_request_id)
            .layer(TraceLayer::new_for_http())
    }

    /// The router as a plain service, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
