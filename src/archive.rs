//! Archive search client
//!
//! One search request per channel, capped at [`SEARCH_SIZE`] hits. The archive
//! search has no cursor, so channels with more archived videos than that
//! come back truncated; the truncation is logged but the capped set is still
//! returned.

use crate::error::{Error, Result, SourceError};
use crate::id_set::IdSet;
use crate::utils::{cancellable, ensure_success};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Maximum hits requested per search
pub const SEARCH_SIZE: usize = 10_000;

/// One archived video as returned in a search hit
#[derive(Clone, Debug, Deserialize)]
pub struct ArchivedVideo {
    /// Channel display name at archive time
    #[serde(default)]
    pub channel_name: String,
    /// Channel id
    #[serde(default)]
    pub channel_id: String,
    /// Video id; empty when the hit carries none
    #[serde(default)]
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    total: Option<SearchTotal>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchTotal {
    value: u64,
    #[serde(default)]
    relation: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: ArchivedVideo,
}

/// Queries the archive for the videos it already holds
pub struct ArchiveClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ArchiveClient {
    /// Create a client for the archive at `base_url`
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// Return the ids of every archived video of `channel_id`
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if `cancel` fires during the request
    /// - [`Error::Archive`] on transport, HTTP status or decoding failures
    pub async fn archived_items(
        &self,
        cancel: &CancellationToken,
        channel_id: &str,
    ) -> Result<IdSet> {
        let result = cancellable(cancel, async {
            self.search(channel_id)
                .await
                .map_err(|source| Error::Archive {
                    channel_id: channel_id.to_string(),
                    source,
                })
        })
        .await?;

        let returned = result.hits.hits.len();
        if let Some(total) = &result.hits.total {
            if total.value > returned as u64 {
                warn!(
                    channel_id,
                    total = total.value,
                    relation = %total.relation,
                    returned,
                    "Archive search truncated, some archived videos were not returned"
                );
            }
        }

        let videos: IdSet = result
            .hits
            .hits
            .into_iter()
            .map(|hit| hit.source.video_id)
            .filter(|id| !id.is_empty())
            .collect();
        debug!(channel_id, count = videos.len(), "Fetched archived videos");

        Ok(videos)
    }

    async fn search(&self, channel_id: &str) -> std::result::Result<SearchResult, SourceError> {
        let url = format!("{}/api/v1/search", self.base_url.trim_end_matches('/'));
        let size = SEARCH_SIZE.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[("size", size.as_str()), ("channel_id", channel_id)])
            .send()
            .await?;
        let body = ensure_success(response)?.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }
}
