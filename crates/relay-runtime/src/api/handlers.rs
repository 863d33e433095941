//! Request handlers and wire types.

use super::ApiState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use nr_01_registration::{AuthContext, IdentityClaim, IdentityVerifier, RegistrationError};
use nr_04_poll_scheduler::{Topology, TopologyError};
use relay_telemetry::{encode_metrics, metric_inc, REGISTRATION_OPS};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hex-encoded identity claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimBody {
    /// Long-term intermediary identifier.
    pub identity_id: String,
    /// Public key.
    pub public_key: String,
    /// Signature over `identity_id`.
    #[serde(default)]
    pub signature: String,
}

impl ClaimBody {
    /// Decode the claim and let `verifier` decide whether it is authentic.
    pub fn authenticate(
        &self,
        verifier: &dyn IdentityVerifier,
    ) -> Result<AuthContext, RegistrationError> {
        let claim = IdentityClaim::new(
            decode_hex("identity_id", &self.identity_id)?,
            decode_hex("public_key", &self.public_key)?,
            decode_hex("signature", &self.signature)?,
        );
        if verifier.verify(&claim) {
            Ok(AuthContext::authenticated(claim))
        } else {
            Ok(AuthContext::unauthenticated(claim))
        }
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, RegistrationError> {
    hex::decode(value)
        .map_err(|e| RegistrationError::MalformedInput(format!("{} is not hex: {}", field, e)))
}

/// `POST /v1/notifications/register` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Caller identity.
    #[serde(flatten)]
    pub claim: ClaimBody,
    /// Push token.
    pub token: String,
}

/// Successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Hex identity hash the registration is keyed by.
    pub identity_hash: String,
    /// Rotation bucket of the identity.
    pub offset_bucket: u32,
}

/// Accepted topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyResponse {
    /// Number of hosts.
    pub hosts: usize,
    /// Host polled for hits.
    pub poll_host: String,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether a topology is active.
    pub topology_loaded: bool,
    /// Poll scheduler state, if it runs.
    pub scheduler_state: Option<String>,
    /// Failed poll cycles since the last success.
    pub consecutive_failures: u32,
    /// Successful polls since start.
    pub polls_completed: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

/// Error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retryable: bool,
}

impl ApiError {
    /// HTTP status sent to the client.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        let status = match &e {
            RegistrationError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            RegistrationError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            RegistrationError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistrationError::Storage(_) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            RegistrationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

impl From<TopologyError> for ApiError {
    fn from(e: TopologyError) -> Self {
        let (status, retryable) = match &e {
            TopologyError::Network(_) => (StatusCode::BAD_GATEWAY, true),
            _ => (StatusCode::BAD_REQUEST, false),
        };
        Self {
            status,
            message: e.to_string(),
            retryable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            retryable: self.retryable,
        };
        (self.status, Json(body)).into_response()
    }
}

fn outcome<T>(result: &Result<T, RegistrationError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(RegistrationError::AuthenticationFailed(_)) => "auth",
        Err(RegistrationError::MalformedInput(_)) => "malformed",
        Err(RegistrationError::NotFound(_)) => "not_found",
        Err(RegistrationError::Storage(_)) => "storage",
    }
}

/// `POST /v1/notifications/register`
pub async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let result = match request.claim.authenticate(state.verifier.as_ref()) {
        Ok(auth) => {
            state
                .registration
                .register_for_notifications(request.token.as_bytes(), &auth)
                .await
        }
        Err(e) => Err(e),
    };
    metric_inc!(REGISTRATION_OPS, &["register", outcome(&result)]);

    let registration = result?;
    Ok(Json(RegisterResponse {
        identity_hash: registration.identity_hash.to_string(),
        offset_bucket: registration.offset_bucket.0,
    }))
}

/// `POST /v1/notifications/unregister`
pub async fn unregister(
    State(state): State<ApiState>,
    Json(claim): Json<ClaimBody>,
) -> Result<StatusCode, ApiError> {
    let result = match claim.authenticate(state.verifier.as_ref()) {
        Ok(auth) => state.registration.unregister_for_notifications(&auth).await,
        Err(e) => Err(e),
    };
    metric_inc!(REGISTRATION_OPS, &["unregister", outcome(&result)]);

    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/topology`
pub async fn update_topology(
    State(state): State<ApiState>,
    Json(topology): Json<Topology>,
) -> Result<Json<TopologyResponse>, ApiError> {
    let active = state.topology.update_topology(topology).await?;
    Ok(Json(TopologyResponse {
        hosts: active.topology.hosts.len(),
        poll_host: active.poll_host.id.clone(),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state
        .scheduler_status
        .as_ref()
        .map(|rx| rx.borrow().clone());
    let degraded = status.as_ref().is_some_and(|s| s.state.is_terminal());

    let body = HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        version: crate::VERSION.to_string(),
        topology_loaded: state.topology.current_topology().is_some(),
        scheduler_state: status
            .as_ref()
            .map(|s| format!("{:?}", s.state).to_lowercase()),
        consecutive_failures: status.as_ref().map_or(0, |s| s.consecutive_failures),
        polls_completed: status.as_ref().map_or(0, |s| s.polls_completed),
    };
    let code = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(body))
}

/// `GET /metrics`
pub async fn metrics() -> Response {
    match encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "[api] Metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
