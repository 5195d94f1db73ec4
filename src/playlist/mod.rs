//! Incremental retrieval of a channel's uploaded videos
//!
//! A playlist is walked page by page. Walking the whole playlist costs one
//! API call per 50 videos, so [`PlaylistFetcher`] only does it when the last
//! complete walk of that playlist is older than the full-fetch interval
//! (72 hours by default). In between, a single page is read on the
//! assumption that new uploads appear at the head of the playlist. Items
//! added anywhere else are picked up by the next full walk.

use crate::error::{Error, Result, SourceError};
use crate::id_set::IdSet;
use crate::utils::cancellable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod youtube;

pub use youtube::YouTubeClient;

/// Items requested per page
pub const PAGE_SIZE: u32 = 50;

/// One page of playlist items
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistPage {
    /// Video ids on this page
    pub video_ids: Vec<String>,
    /// Cursor for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

/// A paginated source of playlist items
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Fetch the page starting at `page_token` (the first page when `None`)
    async fn fetch_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> std::result::Result<PlaylistPage, SourceError>;
}

/// Time of the last complete walk of each playlist
///
/// Entries are only written when a full walk finishes and are never removed.
#[derive(Debug, Default)]
pub struct FetchState {
    last_full_fetch: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl FetchState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// When `playlist_id` was last walked completely
    pub fn last_full_fetch(&self, playlist_id: &str) -> Option<DateTime<Utc>> {
        self.entries().get(playlist_id).copied()
    }

    /// True when `playlist_id` was never walked completely, or not within `interval` of `now`
    pub fn needs_full_fetch(&self, playlist_id: &str, interval: Duration, now: DateTime<Utc>) -> bool {
        match self.last_full_fetch(playlist_id) {
            None => true,
            Some(last) => match (now - last).to_std() {
                Ok(age) => age > interval,
                // Recorded in the future; treat as fresh
                Err(_) => false,
            },
        }
    }

    /// Record a completed full walk
    pub fn record_full_fetch(&self, playlist_id: &str, at: DateTime<Utc>) {
        self.entries().insert(playlist_id.to_string(), at);
    }

    /// Number of playlists ever walked completely
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no playlist has been walked completely yet
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.last_full_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Retrieves the current video ids of playlists, walking them fully only when needed
pub struct PlaylistFetcher {
    source: Arc<dyn PlaylistSource>,
    state: Arc<FetchState>,
    full_fetch_interval: Duration,
}

impl PlaylistFetcher {
    /// Create a fetcher over `source`, recording full walks in `state`
    pub fn new(
        source: Arc<dyn PlaylistSource>,
        state: Arc<FetchState>,
        full_fetch_interval: Duration,
    ) -> Self {
        Self {
            source,
            state,
            full_fetch_interval,
        }
    }

    /// The fetch state shared with this fetcher
    pub fn state(&self) -> &Arc<FetchState> {
        &self.state
    }

    /// Return the video ids currently in `playlist_id`
    ///
    /// Performs a full walk when the last one is older than the full-fetch
    /// interval, otherwise reads the first page only. The first failing page
    /// aborts the call; nothing accumulated so far is returned.
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if `cancel` fires during a page request
    /// - [`Error::Playlist`] for the first page that fails
    pub async fn playlist_items(
        &self,
        cancel: &CancellationToken,
        playlist_id: &str,
    ) -> Result<IdSet> {
        let full = self
            .state
            .needs_full_fetch(playlist_id, self.full_fetch_interval, Utc::now());

        let mut videos = IdSet::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = cancellable(cancel, async {
                self.source
                    .fetch_page(playlist_id, page_token.as_deref())
                    .await
                    .map_err(|source| Error::Playlist {
                        playlist_id: playlist_id.to_string(),
                        source,
                    })
            })
            .await?;
            pages += 1;
            videos.extend(page.video_ids);

            if !full {
                break;
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => {
                    self.state.record_full_fetch(playlist_id, Utc::now());
                    break;
                }
            }
        }

        debug!(
            playlist_id,
            full,
            pages,
            count = videos.len(),
            "Fetched playlist items"
        );

        Ok(videos)
    }
}
