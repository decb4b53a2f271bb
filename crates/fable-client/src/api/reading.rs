//! Reading API.

use crate::client::BackendClient;
use crate::error::Result;
use crate::types::{ProgressRequest, ProgressResponse};

/// Reading API client.
pub struct ReadingApi {
    client: BackendClient,
}

impl ReadingApi {
    pub(crate) fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Record reading progress (already quantized) for a chapter.
    pub async fn update_progress(
        &self,
        token: &str,
        chapter_id: &str,
        progress: u8,
    ) -> Result<ProgressResponse> {
        let body = ProgressRequest {
            chapter_id,
            progress,
        };
        self.client
            .post("/api/reading/progress", &body, Some(token))
            .await
    }
}
