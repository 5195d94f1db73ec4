//! Service root
//!
//! [`Kumo`] wires configuration into the roster cache, the playlist, archive
//! and queue clients, the dispatcher and the cron scheduler, and owns the
//! root cancellation token every piece of work observes.

use crate::archive::ArchiveClient;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::playlist::{FetchState, PlaylistFetcher, YouTubeClient};
use crate::queue::QueueClient;
use crate::reconcile::Reconciler;
use crate::roster::RosterCache;
use crate::scheduler::{CronDispatcher, scheduler_error};
use crate::types::{Channel, FiringReport};
use crate::utils::http_client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;

/// The running reconciler service
pub struct Kumo {
    config: Arc<Config>,
    roster: Arc<RosterCache>,
    fetch_state: Arc<FetchState>,
    dispatcher: Arc<Dispatcher>,
    cron: Arc<CronDispatcher>,
    scheduler: Mutex<Option<JobScheduler>>,
    cancel: CancellationToken,
}

impl Kumo {
    /// Validate `config` and build every component
    ///
    /// Nothing is scheduled until [`Kumo::start`] is called.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http = http_client(config.app.request_timeout)?;
        let dispatcher = Arc::new(Dispatcher::new(
            config.app.max_concurrency,
            config.app.item_concurrency(),
        ));

        let roster = Arc::new(RosterCache::new(
            http.clone(),
            config.archive.channels_list_url.clone(),
            config.cache.roster_ttl,
        ));

        let fetch_state = Arc::new(FetchState::new());
        let youtube = YouTubeClient::new(
            http.clone(),
            config.youtube.api_base_url.clone(),
            config.youtube.api_key.clone(),
        );
        let playlists = PlaylistFetcher::new(
            Arc::new(youtube),
            fetch_state.clone(),
            config.cache.full_fetch_interval,
        );

        let reconciler = Arc::new(Reconciler::new(
            playlists,
            ArchiveClient::new(http.clone(), config.archive.archive_url.clone()),
            QueueClient::new(http, config.archive.queue_url.clone()),
            dispatcher.items().clone(),
        ));

        let cron = Arc::new(CronDispatcher::new(
            roster.clone(),
            reconciler,
            dispatcher.clone(),
            config.cron_presets.clone(),
        ));

        tracing::info!(
            presets = config.cron_presets.len(),
            max_concurrency = config.app.max_concurrency,
            item_concurrency = config.app.item_concurrency(),
            "Kumo initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            roster,
            fetch_state,
            dispatcher,
            cron,
            scheduler: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Register every preset with the cron scheduler, start it, then preload the roster
    ///
    /// A roster that cannot be loaded at startup is fatal; the scheduler is
    /// stopped again before the error is returned.
    pub async fn start(&self) -> Result<()> {
        let mut scheduler = self.cron.register(&self.cancel).await?;
        scheduler.start().await.map_err(scheduler_error)?;
        *self.scheduler.lock().await = Some(scheduler);
        tracing::info!("Cron scheduler started");

        match self.roster.channels(&self.cancel).await {
            Ok(channels) => {
                tracing::info!(channels = channels.len(), "Preloaded channel roster");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to preload channel roster");
                self.stop_scheduler().await;
                Err(e)
            }
        }
    }

    /// Run one firing of `preset` immediately, outside the cron schedule
    pub async fn run_preset(&self, preset: &str) -> Result<FiringReport> {
        self.cron.run_preset(&self.cancel, preset).await
    }

    /// Current roster, served from the cache when fresh
    pub async fn channels(&self) -> Result<Arc<[Channel]>> {
        self.roster.channels(&self.cancel).await
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-playlist full-walk bookkeeping
    pub fn fetch_state(&self) -> &Arc<FetchState> {
        &self.fetch_state
    }

    /// Concurrency pools and the tracker for scheduled work
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Root cancellation token; cancelled by [`Kumo::shutdown`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop scheduling, cancel outstanding work and wait for it to unwind
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.stop_scheduler().await;

        self.cancel.cancel();
        tracing::info!(
            in_flight = self.dispatcher.in_flight(),
            "Cancelled outstanding work"
        );

        self.dispatcher.drain().await;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn stop_scheduler(&self) {
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            if let Err(e) = scheduler.shutdown().await {
                tracing::warn!(error = %e, "Cron scheduler did not shut down cleanly");
            } else {
                tracing::info!("Stopped cron scheduler");
            }
        }
    }
}
