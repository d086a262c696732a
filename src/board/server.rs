use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

use super::api::{self, AppState};
use super::db::BoardDb;
use super::proxy::SqlProxy;

/// Configuration for the board API server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
    /// Create the default board on startup when none exists.
    pub seed_defaults: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5001,
            dev_mode: false,
            seed_defaults: true,
        }
    }
}

/// Build the full application router with request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Start the board API server on top of `proxy`.
pub async fn start_server(config: ServerConfig, proxy: Arc<dyn SqlProxy>) -> Result<()> {
    let backend = proxy.backend();
    let db = BoardDb::new(proxy);

    if config.seed_defaults {
        match db.seed_default_board().await {
            Ok(Some(board)) => info!(board = %board.uuid, "Created default board"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to initialize default data"),
        }
    }

    let state = Arc::new(AppState { db });
    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, backend, "Swimlane API running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
