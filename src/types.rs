//! Core types for kumo

use crate::id_set::IdSet;

/// One upstream channel from the roster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    /// Agency the channel belongs to
    pub agency_name: String,
    /// Roster batch label
    pub batch_name: String,
    /// YouTube channel id (`UC…`)
    pub id: String,
    /// Display name, used as log context
    pub name: String,
    /// Name of the cron preset this channel is processed on
    pub cron_preset: String,
}

impl Channel {
    /// True when this channel is assigned to `preset` (case-insensitive)
    pub fn matches_preset(&self, preset: &str) -> bool {
        self.cron_preset.eq_ignore_ascii_case(preset)
    }
}

/// Observed, archived and missing identifiers for one channel
#[derive(Clone, Debug, Default)]
pub struct Reconciliation {
    /// Videos currently published upstream
    pub observed: IdSet,
    /// Videos already in the archive
    pub archived: IdSet,
    /// `observed - archived`
    pub missing: IdSet,
}

impl Reconciliation {
    /// Compute the missing set from the two snapshots
    pub fn new(observed: IdSet, archived: IdSet) -> Self {
        let missing = observed.difference(&archived);
        Self {
            observed,
            archived,
            missing,
        }
    }
}

/// Result of dispatching one missing video to the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The queue accepted the video
    Enqueued,
    /// The queue rejected the video or could not be reached
    Failed,
    /// Shutdown started before the video was dispatched
    Cancelled,
}

/// Per-channel summary of one reconciliation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelReport {
    /// Channel display name
    pub channel: String,
    /// Number of videos published upstream
    pub observed: usize,
    /// Number of videos already archived
    pub archived: usize,
    /// Number of videos missing from the archive
    pub missing: usize,
    /// Missing videos accepted by the queue
    pub enqueued: usize,
    /// Missing videos the queue did not accept
    pub failed: usize,
    /// Missing videos skipped because of shutdown
    pub cancelled: usize,
}

impl ChannelReport {
    /// Tally one item outcome
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Enqueued => self.enqueued += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Summary of one preset firing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FiringReport {
    /// Preset that fired
    pub preset: String,
    /// Channels in the roster
    pub roster_size: usize,
    /// Channels assigned to this preset
    pub matched: usize,
    /// Channels reconciled successfully
    pub succeeded: usize,
    /// Channels whose reconciliation failed
    pub failed: usize,
    /// Channels abandoned because of shutdown
    pub cancelled: usize,
    /// Videos enqueued across all channels
    pub enqueued: usize,
}
