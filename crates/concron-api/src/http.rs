use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ApiError;

/// Liveness API builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthApi;

impl HealthApi {
    pub fn new() -> Self {
        Self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /healthz - `200 OK` while the process is up, regardless of scheduler state
    pub fn router(self) -> Router {
        Router::new().route("/healthz", get(healthz))
    }
}

/// GET /healthz
async fn healthz() -> &'static str {
    "OK"
}

/// Bind `addr` and serve `router` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })?;
    serve_on(listener, router, shutdown).await
}

pub(crate) async fn serve_on(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let local = listener.local_addr().map_err(ApiError::Serve)?;
    info!(target: "concron.api.http", addr = %local, "http listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ApiError::Serve)?;

    info!(target: "concron.api.http", "http stopped");
    Ok(())
}
