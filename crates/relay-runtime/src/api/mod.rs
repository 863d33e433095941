//! # HTTP API
//!
//! External surface of the relay.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /v1/notifications/register` | record a push token for the caller |
//! | `POST /v1/notifications/unregister` | remove the caller's registration |
//! | `PUT /v1/topology` | replace the network topology |
//! | `GET /health` | liveness and scheduler state |
//! | `GET /metrics` | Prometheus text exposition |
//!
//! Identity claims travel as hex strings. Ed25519 verification of the
//! claim decides whether the registration service sees the caller as
//! authenticated.

pub mod handlers;


use axum::routing::{get, post, put};
use axum::Router;
use nr_01_registration::{IdentityVerifier, RegistrationApi};
use nr_04_poll_scheduler::{SchedulerStatus, TopologyApi};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use handlers::{
    ApiError, ClaimBody, HealthResponse, RegisterRequest, RegisterResponse, TopologyResponse,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Registration RPC surface.
    pub registration: Arc<dyn RegistrationApi>,
    /// Claim verification.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Topology update surface.
    pub topology: Arc<dyn TopologyApi>,
    /// Poll scheduler status, once it runs.
    pub scheduler_status: Option<watch::Receiver<SchedulerStatus>>,
}

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/notifications/register", post(handlers::register))
        .route("/v1/notifications/unregister", post(handlers::unregister))
        .route("/v1/topology", put(handlers::update_topology))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "[api] Listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("[api] Shutdown signal received");
        })
        .await
}
