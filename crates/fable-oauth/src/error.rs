//! Error types for OAuth flows.

use fable_client::FailureKind;
use fable_session::SessionError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur during an OAuth login.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The callback arrived without a state parameter.
    #[error("OAuth callback is missing the state parameter")]
    MissingState,

    /// Stored and received state differ (strict policy only).
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// No stored state was found (strict policy only).
    #[error("No stored OAuth state found")]
    StateNotFound,

    /// The callback arrived without an authorization code.
    #[error("OAuth callback is missing the authorization code")]
    MissingCode,

    /// The provider redirected back with an error instead of a code.
    #[error("Provider returned an error: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// The token endpoint refused the code.
    #[error("Token exchange failed with status {status}")]
    TokenExchangeFailed { status: u16, body: String },

    /// The token endpoint answered 2xx without an access token.
    #[error("Token response did not contain an access token")]
    MissingAccessToken,

    /// The user dismissed the provider popup.
    #[error("Provider login was cancelled")]
    ProviderCancelled,

    /// Any other provider-side failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// Required provider configuration is missing.
    #[error("Config error: {0}")]
    Config(String),

    /// Establishing the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl OAuthError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OAuthError::MissingState
            | OAuthError::StateMismatch
            | OAuthError::StateNotFound
            | OAuthError::MissingCode
            | OAuthError::MissingAccessToken => FailureKind::ProtocolFailure,
            OAuthError::ProviderDenied { .. }
            | OAuthError::TokenExchangeFailed { .. }
            | OAuthError::ProviderCancelled
            | OAuthError::Provider(_) => FailureKind::AuthFailure,
            OAuthError::Network(_) | OAuthError::Config(_) => FailureKind::ProxyInternalError,
            OAuthError::Session(e) => e.kind(),
        }
    }

    /// Text safe to show to the user. Provider bodies are never included.
    pub fn user_message(&self) -> String {
        match self {
            OAuthError::MissingState | OAuthError::StateMismatch | OAuthError::StateNotFound => {
                "Invalid login request. Please try again.".to_string()
            }
            OAuthError::MissingCode => "Authorization code was not received.".to_string(),
            OAuthError::ProviderDenied { .. } | OAuthError::ProviderCancelled => {
                "Login was cancelled.".to_string()
            }
            OAuthError::TokenExchangeFailed { .. }
            | OAuthError::MissingAccessToken
            | OAuthError::Provider(_) => "Login with the provider failed. Please try again.".to_string(),
            OAuthError::Network(_) => fable_session::error::NETWORK_MESSAGE.to_string(),
            OAuthError::Config(_) => fable_client::error::INTERNAL_MESSAGE.to_string(),
            OAuthError::Session(e) => e.user_message(),
        }
    }
}

impl From<fable_config::ConfigError> for OAuthError {
    fn from(e: fable_config::ConfigError) -> Self {
        OAuthError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_body_not_exposed() {
        let err = OAuthError::TokenExchangeFailed {
            status: 400,
            body: r#"{"error":"invalid_grant","error_description":"code expired"}"#.into(),
        };
        assert!(!err.user_message().contains("invalid_grant"));
        assert_eq!(err.kind(), FailureKind::AuthFailure);
    }

    #[test]
    fn test_state_errors_are_protocol_failures() {
        for err in [
            OAuthError::MissingState,
            OAuthError::StateMismatch,
            OAuthError::StateNotFound,
            OAuthError::MissingCode,
            OAuthError::MissingAccessToken,
        ] {
            assert_eq!(err.kind(), FailureKind::ProtocolFailure);
        }
    }

    #[test]
    fn test_session_errors_pass_through() {
        let err: OAuthError = SessionError::InvalidCredentials("Account suspended".into()).into();
        assert_eq!(err.kind(), FailureKind::AuthFailure);
        assert_eq!(err.user_message(), "Account suspended");
    }
}
