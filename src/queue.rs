//! Enqueue sink client

use crate::error::{Error, Result, SourceError};
use crate::utils::cancellable;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Sends missing video ids to the archive ingestion queue
pub struct QueueClient {
    http_client: reqwest::Client,
    url: String,
}

impl QueueClient {
    /// Create a client for the queue endpoint at `url`
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }

    /// PUT `video_id` as the raw request body; only `200 OK` counts as accepted
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if `cancel` fires during the request
    /// - [`Error::Dispatch`] on transport failure or any other status
    pub async fn enqueue(&self, cancel: &CancellationToken, video_id: &str) -> Result<()> {
        cancellable(cancel, async {
            self.put(video_id).await.map_err(|source| Error::Dispatch {
                video_id: video_id.to_string(),
                source,
            })
        })
        .await
    }

    async fn put(&self, video_id: &str) -> std::result::Result<(), SourceError> {
        let response = self
            .http_client
            .put(&self.url)
            .body(video_id.to_string())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: None,
            });
        }
        Ok(())
    }
}
