//! Provider token exchange.
//!
//! Google hands back an ID token from a popup the embedding application
//! owns; LINE is a classic authorization-code exchange against its token
//! endpoint. Neither exchanger persists the tokens it obtains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fable_config::LineConfig;
use fable_session::ProviderToken;
use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};
use crate::state::Provider;

/// Scopes requested from LINE.
pub const LINE_SCOPE: &str = "profile openid";

/// Deadline for a LINE token exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// A token obtained from a provider, ready to hand to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider: Provider,
    /// Google ID token or LINE access token.
    pub token: String,
    /// LINE also returns an OpenID token when `openid` is in scope.
    pub id_token: Option<String>,
}

impl ProviderIdentity {
    /// The token the backend's provider login endpoint expects.
    pub fn to_provider_token(&self) -> ProviderToken {
        match self.provider {
            Provider::Google => ProviderToken::Google(self.token.clone()),
            Provider::Line => ProviderToken::Line(self.token.clone()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Google
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by an identity popup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopupError {
    #[error("popup closed by user")]
    Closed,
    #[error("{0}")]
    Failed(String),
}

/// Something that can show the Google sign-in popup and return an ID token.
#[async_trait]
pub trait IdentityPopup: Send + Sync {
    async fn request_id_token(&self, client_id: &str) -> std::result::Result<String, PopupError>;
}

/// Popup stand-in for an ID token obtained out of band.
#[derive(Debug, Clone)]
pub struct PresetIdToken(pub String);

#[async_trait]
impl IdentityPopup for PresetIdToken {
    async fn request_id_token(&self, _client_id: &str) -> std::result::Result<String, PopupError> {
        Ok(self.0.clone())
    }
}

/// Obtains a Google ID token through an [`IdentityPopup`].
#[derive(Clone)]
pub struct GoogleExchanger {
    popup: Arc<dyn IdentityPopup>,
    client_id: String,
}

impl GoogleExchanger {
    pub fn new(popup: Arc<dyn IdentityPopup>, client_id: impl Into<String>) -> Self {
        Self {
            popup,
            client_id: client_id.into(),
        }
    }

    pub async fn exchange(&self) -> Result<ProviderIdentity> {
        let id_token = self
            .popup
            .request_id_token(&self.client_id)
            .await
            .map_err(|e| match e {
                PopupError::Closed => OAuthError::ProviderCancelled,
                PopupError::Failed(msg) => OAuthError::Provider(msg),
            })?;

        if id_token.is_empty() {
            return Err(OAuthError::Provider("empty ID token".to_string()));
        }

        Ok(ProviderIdentity {
            provider: Provider::Google,
            token: id_token,
            id_token: None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LINE
// ─────────────────────────────────────────────────────────────────────────────

/// Build the LINE authorization URL for a state value.
pub fn build_authorization_url(config: &LineConfig, state: &str) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", config.channel_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("state", state),
        ("scope", LINE_SCOPE),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query)
}

#[derive(Debug, Serialize)]
struct TokenExchangeForm<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct LineTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// Exchanges LINE authorization codes for access tokens.
#[derive(Debug, Clone)]
pub struct LineExchanger {
    http: reqwest::Client,
    config: LineConfig,
    timeout: Duration,
}

impl LineExchanger {
    pub fn new(config: LineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    pub fn authorization_url(&self, state: &str) -> String {
        build_authorization_url(&self.config, state)
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange(&self, code: &str) -> Result<ProviderIdentity> {
        let form = TokenExchangeForm {
            grant_type: "authorization_code",
            code,
            redirect_uri: &self.config.redirect_uri,
            client_id: &self.config.channel_id,
            client_secret: &self.config.channel_secret,
        };

        let response = self
            .http
            .post(&self.config.token_url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, timed_out = e.is_timeout(), "LINE token request failed");
                OAuthError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to read LINE token response");
            OAuthError::Network(e.to_string())
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "LINE token exchange rejected");
            return Err(OAuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LineTokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, "Unparseable LINE token response");
            OAuthError::MissingAccessToken
        })?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(OAuthError::MissingAccessToken)?;

        tracing::debug!("LINE token exchange succeeded");
        Ok(ProviderIdentity {
            provider: Provider::Line,
            token: access_token,
            id_token: parsed.id_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPopup;

    #[async_trait]
    impl IdentityPopup for ClosedPopup {
        async fn request_id_token(&self, _: &str) -> std::result::Result<String, PopupError> {
            Err(PopupError::Closed)
        }
    }

    struct BrokenPopup;

    #[async_trait]
    impl IdentityPopup for BrokenPopup {
        async fn request_id_token(&self, _: &str) -> std::result::Result<String, PopupError> {
            Err(PopupError::Failed("third-party cookies blocked".into()))
        }
    }

    fn line_config() -> LineConfig {
        LineConfig {
            channel_id: "1650000000".into(),
            channel_secret: "s3cret".into(),
            redirect_uri: "https://fable.example/auth/line/callback".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_authorization_url() {
        let url = build_authorization_url(&line_config(), "st-1");
        assert!(url.starts_with("https://access.line.me/oauth2/v2.1/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=1650000000"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Ffable.example%2Fauth%2Fline%2Fcallback"
        ));
        assert!(url.contains("state=st-1"));
        assert!(url.contains("scope=profile%20openid"));
    }

    #[tokio::test]
    async fn test_google_popup_outcomes() {
        let ok = GoogleExchanger::new(Arc::new(PresetIdToken("gid".into())), "client");
        let identity = ok.exchange().await.unwrap();
        assert_eq!(identity.to_provider_token(), ProviderToken::Google("gid".into()));

        let closed = GoogleExchanger::new(Arc::new(ClosedPopup), "client");
        assert!(matches!(
            closed.exchange().await,
            Err(OAuthError::ProviderCancelled)
        ));

        let broken = GoogleExchanger::new(Arc::new(BrokenPopup), "client");
        assert!(matches!(
            broken.exchange().await,
            Err(OAuthError::Provider(ref m)) if m.contains("cookies")
        ));

        let empty = GoogleExchanger::new(Arc::new(PresetIdToken(String::new())), "client");
        assert!(matches!(empty.exchange().await, Err(OAuthError::Provider(_))));
    }
}
