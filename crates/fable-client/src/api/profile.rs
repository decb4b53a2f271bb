//! Profile API.

use crate::client::BackendClient;
use crate::error::Result;
use crate::types::{ChangePasswordRequest, MessageResponse, ProfilePatch, ProfileReply, UserProfile};

/// Profile API client. Every call needs a session token.
pub struct ProfileApi {
    client: BackendClient,
}

impl ProfileApi {
    pub(crate) fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Fetch the profile behind a session token.
    pub async fn get(&self, token: &str) -> Result<UserProfile> {
        let reply: ProfileReply = self.client.get("/api/auth/profile", None, Some(token)).await?;
        Ok(reply.into_profile())
    }

    /// Apply a partial update and return the backend's view of the profile.
    pub async fn update(&self, token: &str, patch: &ProfilePatch) -> Result<UserProfile> {
        let reply: ProfileReply = self.client.put("/api/auth/profile", patch, token).await?;
        Ok(reply.into_profile())
    }

    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<MessageResponse> {
        let body = ChangePasswordRequest {
            current_password,
            new_password,
        };
        self.client
            .put("/api/auth/change-password", &body, token)
            .await
    }
}
