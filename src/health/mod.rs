//! Local liveness probe.
//!
//! A single route, `GET /agent/health`, that always answers `200` with a fixed
//! body. It reads nothing from the connection manager: an agent that is
//! between reconnect attempts is still a healthy process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{NexusError, Result};

/// Path of the liveness route.
pub const HEALTH_ROUTE: &str = "/agent/health";

/// Builds the health router.
pub fn router(body: impl Into<String>) -> Router {
    let body: Arc<str> = Arc::from(body.into());
    Router::new()
        .route(HEALTH_ROUTE, get(agent_health))
        .with_state(body)
}

async fn agent_health(State(body): State<Arc<str>>) -> (StatusCode, String) {
    (StatusCode::OK, body.to_string())
}

/// Binds the health listener. Failure here is fatal for the agent.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| NexusError::Bind { addr, source })
}

/// Serves the health route on an already bound listener until the process ends.
pub async fn serve(listener: TcpListener, body: impl Into<String>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Health service listening on http://{}{}", addr, HEALTH_ROUTE);
    }
    axum::serve(listener, router(body)).await?;
    Ok(())
}

/// Bind and serve in one step.
pub async fn serve_on(addr: SocketAddr, body: impl Into<String>) -> Result<()> {
    let listener = bind(addr).await?;
    serve(listener, body).await
}
