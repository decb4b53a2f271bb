//! The session broker: turns credentials into a session and keeps it.

use std::sync::Arc;

use async_trait::async_trait;
use fable_client::{
    AuthResponse, BackendClient, ProfilePatch, ProgressResponse, ProgressSink, RegisterRequest,
    UserProfile,
};
use fable_config::FableConfig;
use tokio::sync::RwLock;

use crate::error::{Result, SessionError};
use crate::store::{FileSessionStore, Session, SharedSessionStore};
use crate::validate::{RegisterData, validate_email, validate_password, validate_password_field};

/// A token obtained from an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderToken {
    /// Google ID token.
    Google(String),
    /// LINE access token.
    Line(String),
}

impl ProviderToken {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderToken::Google(_) => "google",
            ProviderToken::Line(_) => "line",
        }
    }
}

/// What registration produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    /// The account is usable right away and a session was established.
    Activated(Session),
    /// The backend wants the email address verified first.
    PendingVerification(String),
}

/// Exchanges credentials for sessions and owns the active one.
#[derive(Debug)]
pub struct SessionBroker {
    client: BackendClient,
    store: SharedSessionStore,
    current: RwLock<Option<Session>>,
}

impl SessionBroker {
    pub fn new(client: BackendClient, store: SharedSessionStore) -> Self {
        Self {
            client,
            store,
            current: RwLock::new(None),
        }
    }

    /// Build a broker from configuration, storing the session in the data dir.
    pub fn from_config(config: &FableConfig) -> Result<Self> {
        let client = BackendClient::builder()
            .base_url(config.backend_url())
            .timeout(config.request_timeout())
            .build()?;
        let data_dir = config.data_dir().ok_or_else(|| {
            SessionError::Storage("Could not determine a data directory".to_string())
        })?;
        let store = FileSessionStore::new(&data_dir).with_lifetime(config.session_lifetime());
        Ok(Self::new(client, Arc::new(store)))
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// The active session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// The active session token, if any.
    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| s.session_token.clone())
    }

    /// Persist a session and make it active, replacing any previous one.
    pub async fn set_session(&self, session: Session) -> Result<()> {
        let mut current = self.current.write().await;
        self.store_locked(&mut current, session).await
    }

    /// Write through to the store while the caller holds the `current` lock,
    /// so the record and the active session never diverge.
    async fn store_locked(&self, current: &mut Option<Session>, session: Session) -> Result<()> {
        self.store.save(&session).await?;
        tracing::info!(user_id = %session.user.id, "Session established");
        *current = Some(session);
        Ok(())
    }

    /// Drop the active session and its persisted record. Idempotent.
    pub async fn clear_session(&self) -> Result<()> {
        let mut current = self.current.write().await;
        self.store.delete().await?;
        if let Some(session) = current.take() {
            tracing::info!(user_id = %session.user.id, "Session cleared");
        }
        Ok(())
    }

    /// Revalidate a persisted session with the backend.
    ///
    /// Any failure, whether an expired record, a rejected token or an
    /// unreachable backend, removes the record and yields `None`.
    pub async fn restore_session(&self) -> Option<Session> {
        let stored = match self.store.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session record");
                self.discard().await;
                return None;
            }
        };

        match self.client.profile().get(&stored.session_token).await {
            Ok(user) => {
                let session = Session { user, ..stored };
                *self.current.write().await = Some(session.clone());
                tracing::debug!(user_id = %session.user.id, "Session restored");
                Some(session)
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored session rejected, discarding");
                self.discard().await;
                None
            }
        }
    }

    async fn discard(&self) {
        let mut current = self.current.write().await;
        *current = None;
        if let Err(e) = self.store.delete().await {
            tracing::warn!(error = %e, "Failed to delete session record");
        }
    }

    async fn establish(&self, response: AuthResponse) -> Result<Session> {
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::IncompleteResponse("token"))?;
        let user = response
            .user
            .ok_or(SessionError::IncompleteResponse("user"))?;
        let session = Session {
            session_token: token,
            refresh_token: response.refresh_token,
            user,
        };
        self.set_session(session.clone()).await?;
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Login and registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Email and password login.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<Session> {
        validate_email(email)?;
        validate_password(password)?;

        let response = self
            .client
            .auth()
            .login(email.trim(), password)
            .await
            .map_err(SessionError::from_credential_exchange)?;
        self.establish(response).await
    }

    /// Exchange a provider token for a session.
    pub async fn login_with_provider_token(&self, token: &ProviderToken) -> Result<Session> {
        let auth = self.client.auth();
        let response = match token {
            ProviderToken::Google(id_token) => auth.login_with_google(id_token).await,
            ProviderToken::Line(access_token) => auth.login_with_line(access_token).await,
        }
        .map_err(SessionError::from_credential_exchange)?;

        tracing::debug!(provider = token.provider(), "Provider token accepted");
        self.establish(response).await
    }

    /// Create an account.
    pub async fn register(&self, data: &RegisterData) -> Result<RegisterOutcome> {
        data.validate()?;

        let request = RegisterRequest {
            email: data.email.trim().to_string(),
            password: data.password.clone(),
            username: data.username.clone(),
            display_name: data.display_name.clone(),
        };
        let response = self.client.auth().register(&request).await?;

        if response.token.as_deref().is_some_and(|t| !t.is_empty()) {
            return Ok(RegisterOutcome::Activated(self.establish(response).await?));
        }
        tracing::info!("Registration pending email verification");
        Ok(RegisterOutcome::PendingVerification(request.email))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profile and account maintenance
    // ─────────────────────────────────────────────────────────────────────────

    async fn require_session(&self) -> Result<Session> {
        self.current().await.ok_or(SessionError::NotSignedIn)
    }

    /// Push a partial profile update and merge the reply into the session.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<UserProfile> {
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }
        if let Some(username) = &patch.username {
            crate::validate::validate_username(username)?;
        }

        let session = self.require_session().await?;
        let user = self
            .client
            .profile()
            .update(&session.session_token, patch)
            .await?;

        self.replace_user(user.clone()).await?;
        Ok(user)
    }

    /// Merge a patch into the active session without contacting the backend.
    /// Only the fields the patch sets are overwritten.
    pub async fn merge_user(&self, patch: &ProfilePatch) -> Result<UserProfile> {
        let mut current = self.current.write().await;
        let mut session = current.clone().ok_or(SessionError::NotSignedIn)?;
        session.user.apply(patch);
        let user = session.user.clone();
        self.store_locked(&mut current, session).await?;
        Ok(user)
    }

    /// Re-fetch the profile for the active session.
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let session = self.require_session().await?;
        let user = self.client.profile().get(&session.session_token).await?;
        self.replace_user(user.clone()).await?;
        Ok(user)
    }

    /// Swap the user on whatever session is active once the reply lands.
    async fn replace_user(&self, user: UserProfile) -> Result<()> {
        let mut current = self.current.write().await;
        let session = current.clone().ok_or(SessionError::NotSignedIn)?;
        self.store_locked(&mut current, Session { user, ..session }).await
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        if current_password.is_empty() {
            return Err(SessionError::validation(
                "current_password",
                "Current password is required",
            ));
        }
        validate_password_field("new_password", new_password)?;

        let session = self.require_session().await?;
        self.client
            .profile()
            .change_password(&session.session_token, current_password, new_password)
            .await
            .map_err(SessionError::from_credential_exchange)?;
        tracing::info!(user_id = %session.user.id, "Password changed");
        Ok(())
    }

    /// Returns the backend's acknowledgement message, if any.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        validate_email(email)?;
        let reply = self.client.auth().forgot_password(email.trim()).await?;
        Ok(reply.message)
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<Option<String>> {
        if token.is_empty() {
            return Err(SessionError::validation("token", "Reset token is missing"));
        }
        validate_password(new_password)?;
        let reply = self
            .client
            .auth()
            .reset_password(token, new_password)
            .await?;
        Ok(reply.message)
    }

    pub async fn resend_verification(&self, email: &str) -> Result<Option<String>> {
        validate_email(email)?;
        let reply = self.client.auth().resend_verification(email.trim()).await?;
        Ok(reply.message)
    }

    /// Confirm an email address. Establishes a session if the backend returns one.
    pub async fn verify_email(&self, token: &str) -> Result<Option<Session>> {
        if token.is_empty() {
            return Err(SessionError::validation(
                "token",
                "Verification token is missing",
            ));
        }
        let response = self.client.auth().verify_email(token).await?;
        if response.token.as_deref().is_some_and(|t| !t.is_empty()) && response.user.is_some() {
            return Ok(Some(self.establish(response).await?));
        }
        Ok(None)
    }
}

#[async_trait]
impl ProgressSink for SessionBroker {
    async fn send_progress(
        &self,
        chapter_id: &str,
        progress: u8,
    ) -> fable_client::Result<ProgressResponse> {
        let token = self
            .token()
            .await
            .ok_or_else(|| fable_client::Error::Unauthorized("Not signed in".to_string()))?;
        self.client
            .reading()
            .update_progress(&token, chapter_id, progress)
            .await
    }
}
