//! Cron-driven fan-out of channel reconciliation
//!
//! Every configured preset becomes one cron job. When a preset fires, the
//! roster is loaded, the channels assigned to that preset are selected
//! (case-insensitively) and each of them is reconciled under a permit from
//! the channel pool. Firings of different presets, and overlapping firings
//! of the same preset, run independently of each other.
//!
//! Cron expressions follow the classic five-field format
//! (`minute hour day-of-month month day-of-week`); a six-field expression
//! with a leading seconds field, or an `@hourly`-style descriptor, is also
//! accepted. Day-of-week 0 and 7 both mean Sunday. Schedules are evaluated
//! in UTC.

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::reconcile::Reconciler;
use crate::roster::RosterCache;
use crate::types::FiringReport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Number of fields in a classic cron expression (no seconds)
const CLASSIC_CRON_FIELDS: usize = 5;

/// Rewrite a cron expression into the seconds-first form the job scheduler expects
///
/// Five-field expressions gain a leading `0` seconds field. Descriptors
/// (`@daily`) and six-field expressions are returned with their whitespace
/// normalized; whether they parse is left to the job scheduler. An empty
/// expression is a configuration error.
pub fn normalize_schedule(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.first() {
        None => Err(Error::Config {
            message: "cron expression is empty".to_string(),
            key: None,
        }),
        Some(first) if fields.len() == CLASSIC_CRON_FIELDS && !first.starts_with('@') => {
            Ok(format!("0 {}", fields.join(" ")))
        }
        Some(_) => Ok(fields.join(" ")),
    }
}

/// Runs preset firings against the roster
pub struct CronDispatcher {
    roster: Arc<RosterCache>,
    reconciler: Arc<Reconciler>,
    dispatcher: Arc<Dispatcher>,
    presets: HashMap<String, String>,
}

impl CronDispatcher {
    /// Create a dispatcher for the given preset name to cron expression mapping
    pub fn new(
        roster: Arc<RosterCache>,
        reconciler: Arc<Reconciler>,
        dispatcher: Arc<Dispatcher>,
        presets: HashMap<String, String>,
    ) -> Self {
        Self {
            roster,
            reconciler,
            dispatcher,
            presets,
        }
    }

    /// Process every roster channel assigned to `preset`
    ///
    /// Channels run concurrently, bounded by the channel pool. A failing
    /// channel is logged and counted; it never stops the others. Only a
    /// roster failure, or cancellation before the channels are dispatched,
    /// fails the firing.
    pub async fn run_preset(
        &self,
        cancel: &CancellationToken,
        preset: &str,
    ) -> Result<FiringReport> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!(preset, "Running cron job");

        let channels = self.roster.channels(cancel).await?;
        let mut report = FiringReport {
            preset: preset.to_string(),
            roster_size: channels.len(),
            ..Default::default()
        };

        let mut tasks = JoinSet::new();
        for channel in channels.iter().filter(|c| c.matches_preset(preset)) {
            report.matched += 1;

            let channel = channel.clone();
            let reconciler = self.reconciler.clone();
            let pool = self.dispatcher.channels().clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = pool
                    .with_permit(&cancel, reconciler.process_channel(&cancel, &channel))
                    .await;
                (channel, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(channel_report))) => {
                    report.succeeded += 1;
                    report.enqueued += channel_report.enqueued;
                }
                Ok((channel, Err(e))) if e.is_cancelled() => {
                    debug!(channel = %channel.name, "Channel processing cancelled");
                    report.cancelled += 1;
                }
                Ok((channel, Err(e))) => {
                    error!(
                        channel = %channel.name,
                        channel_id = %channel.id,
                        code = e.error_code(),
                        error = %e,
                        "Failed to process channel"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    error!(preset, error = %e, "Channel task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            preset,
            roster = report.roster_size,
            matched = report.matched,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            enqueued = report.enqueued,
            "Finished cron job"
        );

        Ok(report)
    }

    /// Start a tracked firing of `preset`, unless shutdown has begun
    pub fn fire(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        preset: &str,
    ) -> Option<JoinHandle<()>> {
        if cancel.is_cancelled() {
            debug!(preset, "Ignoring cron firing during shutdown");
            return None;
        }

        let this = self.clone();
        let cancel = cancel.clone();
        let preset = preset.to_string();
        Some(self.dispatcher.spawn(async move {
            match this.run_preset(&cancel, &preset).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => debug!(preset, "Cron job cancelled"),
                Err(e) => error!(
                    preset,
                    code = e.error_code(),
                    error = %e,
                    "Cron job failed"
                ),
            }
        }))
    }

    /// Build a job scheduler with one job per preset
    ///
    /// The scheduler is returned unstarted. Each job only spawns a tracked
    /// firing and returns, so stopping the scheduler never drops work that
    /// is already running.
    ///
    /// # Errors
    /// - [`Error::Config`] for a preset whose expression cannot be parsed
    /// - [`Error::Scheduler`] if the job scheduler cannot be created
    pub async fn register(self: &Arc<Self>, cancel: &CancellationToken) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

        let mut presets: Vec<(&String, &String)> = self.presets.iter().collect();
        presets.sort();

        for (name, expression) in presets {
            let key = format!("cron_presets.{name}");
            let schedule = match normalize_schedule(expression) {
                Err(Error::Config { message, .. }) => return Err(Error::config(message, key)),
                other => other?,
            };
            info!(preset = %name, schedule = %schedule, "Registering cron preset");

            let this = self.clone();
            let cancel = cancel.clone();
            let preset = name.clone();
            let job = Job::new_async(schedule.as_str(), move |_id, _scheduler| {
                let _ = this.fire(&cancel, &preset);
                Box::pin(async {})
            })
            .map_err(|e| Error::config(format!("invalid cron expression {expression:?}: {e}"), key))?;

            scheduler.add(job).await.map_err(scheduler_error)?;
        }

        Ok(scheduler)
    }
}

pub(crate) fn scheduler_error(e: impl std::fmt::Display) -> Error {
    Error::Scheduler(e.to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
