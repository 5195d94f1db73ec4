//! YouTube Data API `playlistItems.list` client

use super::{PAGE_SIZE, PlaylistPage, PlaylistSource};
use crate::error::SourceError;
use async_trait::async_trait;
use serde::Deserialize;

/// [`PlaylistSource`] backed by the YouTube Data API v3
pub struct YouTubeClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    resource_id: Option<ResourceId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

impl YouTubeClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PlaylistSource for YouTubeClient {
    async fn fetch_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage, SourceError> {
        let url = format!("{}/playlistItems", self.base_url.trim_end_matches('/'));
        let max_results = PAGE_SIZE.to_string();

        let mut request = self.http_client.get(&url).query(&[
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
            ("key", self.api_key.as_str()),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<GoogleErrorEnvelope>(&body)
                .ok()
                .map(|envelope| envelope.error.message);
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let list: PlaylistItemListResponse = serde_json::from_slice(&body)?;
        let video_ids = list
            .items
            .into_iter()
            .filter_map(|item| item.snippet?.resource_id?.video_id)
            .collect();

        Ok(PlaylistPage {
            video_ids,
            next_page_token: list.next_page_token,
        })
    }
}
