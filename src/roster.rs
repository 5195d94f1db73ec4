//! Channel roster retrieval and caching
//!
//! The roster is a tab-separated text file served over HTTP. Each record is
//! `agency, batch, channel id, channel name, cron preset`; blank lines and
//! lines starting with `#` are ignored, as are records with fewer than five
//! fields.
//!
//! [`RosterCache`] keeps the last fetched roster for a freshness window.
//! Concurrent callers that find the entry stale are funnelled through a
//! refresh gate so only one of them performs the fetch; the others reuse its
//! result. The lock guarding the cached entry is only held to copy or swap
//! it, never across the HTTP round trip.

use crate::error::{Error, Result, SourceError};
use crate::types::Channel;
use crate::utils::{cancellable, ensure_success};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Minimum number of tab-separated fields in a roster record
const ROSTER_FIELDS: usize = 5;

/// Parse the roster text format into channels
pub fn parse_roster(text: &str) -> Vec<Channel> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields.len() < ROSTER_FIELDS {
                return None;
            }
            Some(Channel {
                agency_name: fields[0].to_string(),
                batch_name: fields[1].to_string(),
                id: fields[2].to_string(),
                name: fields[3].to_string(),
                cron_preset: fields[4].to_string(),
            })
        })
        .collect()
}

struct RosterEntry {
    channels: Arc<[Channel]>,
    fetched_at: Instant,
}

/// Time-bounded cache in front of the roster source
pub struct RosterCache {
    http_client: reqwest::Client,
    url: String,
    ttl: Duration,
    entry: RwLock<Option<RosterEntry>>,
    refresh: tokio::sync::Mutex<()>,
}

impl RosterCache {
    /// Create a cache for the roster at `url`, reusing fetches younger than `ttl`
    pub fn new(http_client: reqwest::Client, url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http_client,
            url: url.into(),
            ttl,
            entry: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Return the roster, fetching it only when the cached copy is stale
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if `cancel` fires while waiting or fetching
    /// - [`Error::Roster`] on transport, HTTP status or decoding failures
    pub async fn channels(&self, cancel: &CancellationToken) -> Result<Arc<[Channel]>> {
        if let Some(channels) = self.fresh() {
            return Ok(channels);
        }

        let _gate = cancellable(cancel, async { Ok(self.refresh.lock().await) }).await?;

        // Another caller may have refreshed while we waited for the gate
        if let Some(channels) = self.fresh() {
            debug!("Reusing roster refreshed by a concurrent caller");
            return Ok(channels);
        }

        let channels: Arc<[Channel]> = self.fetch(cancel).await?.into();
        info!(count = channels.len(), "Fetched channel roster");

        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(RosterEntry {
            channels: channels.clone(),
            fetched_at: Instant::now(),
        });

        Ok(channels)
    }

    /// Drop the cached roster so the next call fetches it again
    pub fn invalidate(&self) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fresh(&self) -> Option<Arc<[Channel]>> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.channels.clone())
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<Channel>> {
        cancellable(cancel, async {
            let body = self.fetch_body().await.map_err(Error::Roster)?;
            Ok(parse_roster(&body))
        })
        .await
    }

    async fn fetch_body(&self) -> std::result::Result<String, SourceError> {
        let response = ensure_success(self.http_client.get(&self.url).send().await?)?;
        let bytes = response.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| SourceError::Decode(format!("roster is not valid UTF-8: {e}")))
    }
}
