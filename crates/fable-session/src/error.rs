//! Error types for session operations.

use fable_client::FailureKind;

/// Shown when the backend cannot be reached at all.
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Local input failed validation; nothing was sent.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The backend refused the credentials.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The operation needs a signed-in session.
    #[error("Not signed in")]
    NotSignedIn,

    /// The backend could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered 2xx but left out a required field.
    #[error("Incomplete backend response: missing {0}")]
    IncompleteResponse(&'static str),

    /// Any other backend failure.
    #[error(transparent)]
    Backend(fable_client::Error),

    /// The session record could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Map a backend error from a credential exchange: 400 and 401 mean the
    /// credentials were wrong.
    pub(crate) fn from_credential_exchange(err: fable_client::Error) -> Self {
        match err {
            fable_client::Error::Rejected { status, message } if status == 400 || status == 401 => {
                SessionError::InvalidCredentials(message)
            }
            other => other.into(),
        }
    }

    /// The field that failed validation, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SessionError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Validation { .. } => FailureKind::ClientValidationFailure,
            SessionError::InvalidCredentials(_) | SessionError::NotSignedIn => {
                FailureKind::AuthFailure
            }
            SessionError::Network(_)
            | SessionError::IncompleteResponse(_)
            | SessionError::Storage(_) => FailureKind::ProxyInternalError,
            SessionError::Backend(e) => e.kind(),
        }
    }

    /// Text safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Validation { message, .. } => message.clone(),
            SessionError::InvalidCredentials(message) => message.clone(),
            SessionError::NotSignedIn => "Please sign in to continue.".to_string(),
            SessionError::Network(_) => NETWORK_MESSAGE.to_string(),
            SessionError::IncompleteResponse(_) | SessionError::Storage(_) => {
                fable_client::error::INTERNAL_MESSAGE.to_string()
            }
            SessionError::Backend(e) => e.client_message(),
        }
    }
}

impl From<fable_client::Error> for SessionError {
    fn from(err: fable_client::Error) -> Self {
        match err {
            fable_client::Error::Transport(cause) => SessionError::Network(cause),
            other => SessionError::Backend(other),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_exchange_mapping() {
        let err = SessionError::from_credential_exchange(fable_client::Error::Rejected {
            status: 401,
            message: "Wrong password".into(),
        });
        assert!(matches!(err, SessionError::InvalidCredentials(ref m) if m == "Wrong password"));
        assert_eq!(err.kind(), FailureKind::AuthFailure);

        let err = SessionError::from_credential_exchange(fable_client::Error::Rejected {
            status: 403,
            message: "Suspended".into(),
        });
        assert!(matches!(err, SessionError::Backend(_)));
        assert_eq!(err.user_message(), "Suspended");
    }

    #[test]
    fn test_transport_becomes_network() {
        let err: SessionError = fable_client::Error::Transport("connection refused".into()).into();
        assert!(matches!(err, SessionError::Network(_)));
        assert!(!err.user_message().contains("refused"));
    }

    #[test]
    fn test_validation_carries_field() {
        let err = SessionError::validation("password", "too short");
        assert_eq!(err.field(), Some("password"));
        assert_eq!(err.kind(), FailureKind::ClientValidationFailure);
        assert_eq!(err.user_message(), "too short");
    }
}
