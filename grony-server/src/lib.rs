//! Grony Server
//!
//! The request-driven half of grony: a loopback-only HTTP endpoint that lets
//! the client add, remove and initialize repositories while the scheduler is
//! running. Mutations land in the registry file and reach the scheduler at
//! its next reload.

pub mod api;
pub mod service;
pub mod state;

pub use api::create_router;
pub use state::AppState;

use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Binds `127.0.0.1:{port}` and serves until `shutdown` turns true
pub async fn serve(port: u16, state: AppState, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control server to {}", addr))?;

    serve_on(listener, state, shutdown).await
}

/// Serves on an already bound listener
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    tracing::info!("Control server listening on {}", listener.local_addr()?);

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // A dropped sender counts as a stop request
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("Control server error")?;

    tracing::info!("Control server stopped");
    Ok(())
}
