//! Error types for the server.
//!
//! Every failure leaves the server as `(status, {"error": message})`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fable_client::{ErrorBody, FailureKind};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Anything the forwarder reported, already classified.
    #[error(transparent)]
    Proxy(#[from] fable_client::Error),

    /// Inbound request could not be understood.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<fable_config::ConfigError> for ServerError {
    fn from(e: fable_config::ConfigError) -> Self {
        ServerError::Config(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Proxy(e) => {
                StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ServerError::Proxy(e) => e.kind(),
            ServerError::BadRequest(_) => FailureKind::ClientValidationFailure,
            ServerError::Internal(_) | ServerError::Config(_) => FailureKind::ProxyInternalError,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ServerError::Proxy(e) => e.to_body(),
            ServerError::BadRequest(msg) => ErrorBody { error: msg.clone() },
            ServerError::Internal(_) | ServerError::Config(_) => ErrorBody {
                error: fable_client::error::INTERNAL_MESSAGE.to_string(),
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::debug!(kind = ?self.kind(), error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
