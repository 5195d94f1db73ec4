//! Reconciliation of a channel's uploads against the archive
//!
//! For one channel: derive the uploads playlist id, fetch what is published,
//! fetch what is archived, and enqueue the difference. Each missing video is
//! dispatched as its own task under the item permit pool; one video failing
//! to enqueue never affects the others, and every outcome is tallied into
//! the channel's [`ChannelReport`].

use crate::archive::ArchiveClient;
use crate::dispatch::PermitPool;
use crate::error::{Error, Result};
use crate::playlist::PlaylistFetcher;
use crate::queue::QueueClient;
use crate::types::{Channel, ChannelReport, ItemOutcome, Reconciliation};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Prefix of YouTube channel ids
const CHANNEL_PREFIX: &str = "UC";

/// Prefix of a channel's uploads playlist id
const UPLOADS_PREFIX: &str = "UU";

/// Uploads playlist id of a channel: `UCxyz` becomes `UUxyz`
pub fn playlist_id_for(channel_id: &str) -> Result<String> {
    channel_id
        .strip_prefix(CHANNEL_PREFIX)
        .map(|rest| format!("{UPLOADS_PREFIX}{rest}"))
        .ok_or_else(|| Error::InvalidChannelId(channel_id.to_string()))
}

/// Computes and dispatches the videos each channel is missing from the archive
pub struct Reconciler {
    playlists: PlaylistFetcher,
    archive: ArchiveClient,
    queue: Arc<QueueClient>,
    items: PermitPool,
}

impl Reconciler {
    /// Create a reconciler dispatching enqueue requests through `items`
    pub fn new(
        playlists: PlaylistFetcher,
        archive: ArchiveClient,
        queue: QueueClient,
        items: PermitPool,
    ) -> Self {
        Self {
            playlists,
            archive,
            queue: Arc::new(queue),
            items,
        }
    }

    /// Fetch published and archived videos for `channel` and compute the difference
    ///
    /// The channel id is validated before any request is made. The archive
    /// is queried after the playlist so it is never older than the
    /// published snapshot.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        channel: &Channel,
    ) -> Result<Reconciliation> {
        let playlist_id = playlist_id_for(&channel.id)?;

        let observed = self.playlists.playlist_items(cancel, &playlist_id).await?;
        let archived = self.archive.archived_items(cancel, &channel.id).await?;
        let reconciliation = Reconciliation::new(observed, archived);

        info!(
            channel = %channel.name,
            observed = reconciliation.observed.len(),
            archived = reconciliation.archived.len(),
            missing = reconciliation.missing.len(),
            "Reconciled channel"
        );

        Ok(reconciliation)
    }

    /// Reconcile `channel` and enqueue every missing video
    ///
    /// Returns once every dispatched video has reached an outcome.
    pub async fn process_channel(
        &self,
        cancel: &CancellationToken,
        channel: &Channel,
    ) -> Result<ChannelReport> {
        let reconciliation = self.reconcile(cancel, channel).await?;

        let mut report = ChannelReport {
            channel: channel.name.clone(),
            observed: reconciliation.observed.len(),
            archived: reconciliation.archived.len(),
            missing: reconciliation.missing.len(),
            ..Default::default()
        };
        if reconciliation.missing.is_empty() {
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        for video_id in reconciliation.missing {
            let queue = self.queue.clone();
            let items = self.items.clone();
            let cancel = cancel.clone();
            let channel_name = channel.name.clone();
            tasks.spawn(async move {
                dispatch_item(&queue, &items, &cancel, &channel_name, &video_id).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(channel = %channel.name, error = %e, "Enqueue task panicked");
                    report.record(ItemOutcome::Failed);
                }
            }
        }

        info!(
            channel = %report.channel,
            enqueued = report.enqueued,
            failed = report.failed,
            cancelled = report.cancelled,
            "Dispatched missing videos"
        );

        Ok(report)
    }
}

async fn dispatch_item(
    queue: &QueueClient,
    items: &PermitPool,
    cancel: &CancellationToken,
    channel: &str,
    video_id: &str,
) -> ItemOutcome {
    match items
        .with_permit(cancel, queue.enqueue(cancel, video_id))
        .await
    {
        Ok(()) => {
            debug!(channel, video_id, "Enqueued video");
            ItemOutcome::Enqueued
        }
        Err(e) if e.is_cancelled() => ItemOutcome::Cancelled,
        Err(e) => {
            warn!(
                channel,
                video_id,
                code = e.error_code(),
                error = %e,
                "Failed to enqueue video"
            );
            ItemOutcome::Failed
        }
    }
}
