//! Auth API.

use serde_json::json;

use crate::client::BackendClient;
use crate::error::Result;
use crate::types::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest};

/// Auth API client.
pub struct AuthApi {
    client: BackendClient,
}

impl AuthApi {
    pub(crate) fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Exchange email and password for a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.client.post("/api/auth/login", &body, None).await
    }

    /// Exchange a Google ID token for a session token.
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthResponse> {
        self.client
            .post("/api/auth/google", &json!({ "token": id_token }), None)
            .await
    }

    /// Exchange a LINE access token for a session token.
    pub async fn login_with_line(&self, access_token: &str) -> Result<AuthResponse> {
        self.client
            .post("/api/auth/line", &json!({ "accessToken": access_token }), None)
            .await
    }

    /// Create an account.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.client.post("/api/auth/register", request, None).await
    }

    /// Request a password-reset email.
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse> {
        self.client
            .post("/api/auth/forgot-password", &json!({ "email": email }), None)
            .await
    }

    /// Set a new password using a reset token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse> {
        let body = ResetPasswordRequest {
            token,
            new_password,
        };
        self.client.post("/api/auth/reset-password", &body, None).await
    }

    /// Ask for another verification email.
    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse> {
        self.client
            .post(
                "/api/auth/resend-verification",
                &json!({ "email": email }),
                None,
            )
            .await
    }

    /// Confirm an email address. Some backends log the user in on success.
    pub async fn verify_email(&self, token: &str) -> Result<AuthResponse> {
        let query = format!("token={}", urlencoding::encode(token));
        self.client
            .get("/api/auth/verify-email", Some(query), None)
            .await
    }
}
