//! Cold-call agent server
//!
//! Provides the HTTP API for starting calls and processing prospect turns.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod state;

pub use auth::auth_middleware;
pub use http::create_router;
pub use metrics::{init_metrics, record_call_ended, record_call_started, record_error, record_request, record_turn};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cold_call_agent::CallError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Call(err) => match err {
                CallError::DuplicateSession(_) | CallError::Busy(_) => StatusCode::CONFLICT,
                CallError::UnknownSession(_) => StatusCode::NOT_FOUND,
                CallError::CallAlreadyOver(_) => StatusCode::GONE,
                CallError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                CallError::CapacityExceeded(_) | CallError::ServiceUnavailable { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Call(err) => match err {
                CallError::DuplicateSession(_) => "duplicate_session",
                CallError::Busy(_) => "session_busy",
                CallError::UnknownSession(_) => "unknown_session",
                CallError::CallAlreadyOver(_) => "call_over",
                CallError::InvalidRequest(_) => "invalid_request",
                CallError::CapacityExceeded(_) => "capacity_exceeded",
                CallError::ServiceUnavailable { .. } => "service_unavailable",
            },
            ServerError::Auth(_) => "unauthorized",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to clients
    fn public_message(&self) -> String {
        match self {
            ServerError::Call(CallError::ServiceUnavailable { collaborator, .. }) => format!(
                "The {} is temporarily unavailable; the turn was not applied and can be retried",
                collaborator
            ),
            ServerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }
        record_error(code);

        let body = Json(serde_json::json!({
            "error": code,
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}
