//! Client error types and the failure taxonomy shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned when a protected request carries no usable bearer token.
pub const MISSING_AUTH_MESSAGE: &str = "No valid authorization header";

/// Message returned when the backend is unreachable or misbehaving.
pub const UNAVAILABLE_MESSAGE: &str = "Backend service unavailable";

/// Message returned for unclassified internal failures.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Fallback when the backend rejects a request without a message.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Request failed";

/// Coarse classification every error in the system maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Invalid credentials, missing bearer token, provider rejection.
    AuthFailure,
    /// Missing or mismatched OAuth state, missing code or access token.
    ProtocolFailure,
    /// Backend unreachable or answering with a non-JSON body.
    BackendUnavailable,
    /// Backend reachable and explicitly reporting an error.
    BackendRejected,
    /// Malformed local input.
    ClientValidationFailure,
    /// Unclassified transport or runtime fault.
    ProxyInternalError,
}

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A protected request had no usable bearer token. Never sent.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend answered with a non-JSON content type.
    #[error("Backend unavailable (status {status}, content type {content_type:?})")]
    BackendUnavailable {
        /// Status the backend actually returned.
        status: u16,
        /// Declared content type, if any.
        content_type: Option<String>,
    },

    /// Backend answered with JSON and a non-success status.
    #[error("Backend rejected request ({status}): {message}")]
    Rejected {
        /// Backend status code.
        status: u16,
        /// Backend-provided message.
        message: String,
    },

    /// Connection refused, timeout, DNS failure and similar.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body declared as JSON could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Status code presented to the caller.
    pub fn status(&self) -> u16 {
        match self {
            Error::Unauthorized(_) => 401,
            Error::BackendUnavailable { .. } => 503,
            Error::Rejected { status, .. } => *status,
            Error::Transport(_) | Error::Decode(_) | Error::InvalidUrl(_) | Error::Config(_) => 500,
        }
    }

    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Unauthorized(_) => FailureKind::AuthFailure,
            Error::BackendUnavailable { .. } => FailureKind::BackendUnavailable,
            Error::Rejected { .. } => FailureKind::BackendRejected,
            Error::Transport(_) | Error::Decode(_) | Error::InvalidUrl(_) | Error::Config(_) => {
                FailureKind::ProxyInternalError
            }
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Backend messages are relayed verbatim; transport and decoding
    /// details are replaced with generic text.
    pub fn client_message(&self) -> String {
        match self {
            Error::Unauthorized(msg) => msg.clone(),
            Error::BackendUnavailable { .. } => UNAVAILABLE_MESSAGE.to_string(),
            Error::Rejected { message, .. } => message.clone(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }

    /// Check if this is an authentication error (401/403).
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status(), 401 | 403)
    }

    /// Check if the failure was caused by the request itself (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Server-side or transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable { .. } | Error::Transport(_)
        ) || matches!(self, Error::Rejected { status, .. } if *status >= 500)
    }

    /// The uniform client-facing body.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.client_message(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client-facing error body: `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
