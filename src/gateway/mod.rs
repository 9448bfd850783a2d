//! Demo HTTP server with signature-protected routes.

pub mod handlers;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{any, get},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::api_auth::{AuthState, signature_auth_middleware};

pub const HEALTH_PATH: &str = "/api/v1/health";

/// Build the router. Every route sits behind the middleware; `/api/v1/health`
/// is only reachable unsigned if it is in the configured skip paths.
pub fn build_router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(handlers::health_check))
        .route("/api/v1/whoami", get(handlers::whoami))
        .route("/api/v1/echo", any(handlers::echo))
        .layer(from_fn_with_state(state.clone(), signature_auth_middleware))
        .with_state(state)
}

pub async fn run_server(host: &str, port: u16, state: Arc<AuthState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("Health:    {}", HEALTH_PATH);
    tracing::info!("Protected: /api/v1/whoami, /api/v1/echo");

    axum::serve(listener, app).await?;
    Ok(())
}
