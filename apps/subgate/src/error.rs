use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-scoped failures of the aggregation pipeline.
///
/// Malformed per-inbound settings and failed per-client traffic lookups are
/// absorbed where they occur and only surface here when they leave zero
/// usable data.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("panel login rejected: {0}")]
    AuthenticationFailed(String),

    #[error("panel login succeeded but returned no session cookie")]
    SessionToken,

    #[error("no client found for subscription {0}")]
    NoSuchSubscription(String),

    #[error("no traffic data could be collected for subscription {0}")]
    NoTrafficData(String),

    #[error("one-time code generation failed: {0}")]
    Totp(String),

    #[error("subscription payload is not valid base64 text: {0}")]
    PayloadEncoding(String),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoSuchSubscription(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
