//! End-to-end provider login flows.
//!
//! A LINE login is two halves separated by a browser redirect:
//! [`LineLogin::begin`] issues state and builds the authorization URL, and
//! [`LineLogin::handle_callback`] runs when the provider redirects back.
//! The callback half runs, in order: gate, state check, code exchange,
//! backend login, redirect.

use std::sync::Arc;
use std::time::Duration;

use fable_client::SharedNotifier;
use fable_config::FableConfig;
use fable_session::{Session, SessionBroker};
use url::Url;

use crate::error::{OAuthError, Result};
use crate::gate::CallbackGate;
use crate::provider::{GoogleExchanger, LineExchanger};
use crate::state::{Provider, StateGuard};

/// Where failed logins are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where successful logins are sent.
pub const DEFAULT_SUCCESS_REDIRECT: &str = "/";

/// Delay before a failed callback redirects to the login page.
pub const DEFAULT_FAILURE_DELAY: Duration = Duration::from_secs(3);

/// Query parameters LINE sends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Parse the full callback URL the browser landed on.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| OAuthError::Provider(format!("invalid callback URL: {}", e)))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }
}

/// How a callback ended.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Signed in; navigate to `redirect_to`.
    Succeeded { session: Session, redirect_to: String },
    /// Failed; show the error, then navigate to `redirect_to` after `after`.
    Failed {
        error: OAuthError,
        redirect_to: String,
        after: Duration,
    },
    /// A duplicate invocation; the first one is handling the callback.
    Ignored,
}

impl CallbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Succeeded { .. })
    }

    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            CallbackOutcome::Succeeded { redirect_to, .. }
            | CallbackOutcome::Failed { redirect_to, .. } => Some(redirect_to.as_str()),
            CallbackOutcome::Ignored => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LINE
// ─────────────────────────────────────────────────────────────────────────────

/// The LINE authorization-code login.
pub struct LineLogin {
    guard: StateGuard,
    exchanger: LineExchanger,
    broker: Arc<SessionBroker>,
    notifier: SharedNotifier,
    failure_delay: Duration,
}

impl LineLogin {
    pub fn new(
        guard: StateGuard,
        exchanger: LineExchanger,
        broker: Arc<SessionBroker>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            guard,
            exchanger,
            broker,
            notifier,
            failure_delay: DEFAULT_FAILURE_DELAY,
        }
    }

    /// Wire up a LINE login from configuration.
    pub fn from_config(
        config: &FableConfig,
        broker: Arc<SessionBroker>,
        notifier: SharedNotifier,
    ) -> Result<Self> {
        let line = config.require_line()?.clone();
        let data_dir = config
            .data_dir()
            .ok_or_else(|| OAuthError::Config("Could not determine a data directory".into()))?;
        let guard = StateGuard::with_data_dir(&data_dir).with_policy(config.state_policy());
        let exchanger = LineExchanger::new(line).with_timeout(config.request_timeout());
        Ok(Self::new(guard, exchanger, broker, notifier)
            .with_failure_delay(config.failure_redirect_delay()))
    }

    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    pub fn guard(&self) -> &StateGuard {
        &self.guard
    }

    /// Issue state and return the URL to send the browser to.
    pub fn begin(&self) -> String {
        let state = self.guard.issue(Provider::Line);
        self.exchanger.authorization_url(&state.value)
    }

    /// Handle the provider redirect. Duplicate invocations sharing `gate`
    /// return [`CallbackOutcome::Ignored`].
    pub async fn handle_callback(
        &self,
        gate: &CallbackGate,
        params: &CallbackParams,
    ) -> CallbackOutcome {
        match gate.run(self.complete(params)).await {
            None => CallbackOutcome::Ignored,
            Some(Ok(session)) => {
                self.notifier.success("Logged in with LINE");
                CallbackOutcome::Succeeded {
                    session,
                    redirect_to: DEFAULT_SUCCESS_REDIRECT.to_string(),
                }
            }
            Some(Err(error)) => {
                tracing::warn!(kind = ?error.kind(), error = %error, "LINE login failed");
                self.notifier.error(&error.user_message());
                CallbackOutcome::Failed {
                    error,
                    redirect_to: LOGIN_PATH.to_string(),
                    after: self.failure_delay,
                }
            }
        }
    }

    async fn complete(&self, params: &CallbackParams) -> Result<Session> {
        let check = self.guard.consume(Provider::Line, params.state.as_deref())?;
        tracing::debug!(
            check = ?check,
            verified = check.is_verified(),
            "LINE callback state checked"
        );

        if let Some(error) = &params.error {
            return Err(OAuthError::ProviderDenied {
                error: error.clone(),
                description: params.error_description.clone(),
            });
        }
        let code = params.code.as_deref().ok_or(OAuthError::MissingCode)?;

        let identity = self.exchanger.exchange(code).await?;
        let session = self
            .broker
            .login_with_provider_token(&identity.to_provider_token())
            .await?;
        Ok(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Google
// ─────────────────────────────────────────────────────────────────────────────

/// The Google popup login.
pub struct GoogleLogin {
    exchanger: GoogleExchanger,
    broker: Arc<SessionBroker>,
    notifier: SharedNotifier,
}

impl GoogleLogin {
    pub fn new(
        exchanger: GoogleExchanger,
        broker: Arc<SessionBroker>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            exchanger,
            broker,
            notifier,
        }
    }

    /// Run the popup and exchange its ID token for a session.
    pub async fn login(&self) -> Result<Session> {
        let result = async {
            let identity = self.exchanger.exchange().await?;
            let session = self
                .broker
                .login_with_provider_token(&identity.to_provider_token())
                .await?;
            Ok::<_, OAuthError>(session)
        }
        .await;

        match &result {
            Ok(_) => self.notifier.success("Logged in with Google"),
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), error = %e, "Google login failed");
                self.notifier.error(&e.user_message());
            }
        }
        result
    }
}
