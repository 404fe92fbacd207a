//! `api` crate: HTTP host for a relay function.
//!
//! Exposes:
//!   POST /          invoke the function (hint or workflow step)
//!   POST /invoke    same as `/`
//!   GET  /health    liveness and instance identity

pub mod error;
pub mod routes;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::ApiError;
pub use routes::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(routes::invoke::invoke))
        .route("/invoke", post(routes::invoke::invoke))
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C, then let detached hints and reports finish.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "relay function listening");

    let runtime = std::sync::Arc::clone(&state.runtime);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("shutting down, waiting for outstanding hints and reports");
    runtime.settle().await;
    Ok(())
}
