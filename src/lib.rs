//! # kumo
//!
//! Keeps a video archive in step with the channels it follows.
//!
//! On every firing of a cron preset, kumo loads the channel roster, selects
//! the channels assigned to that preset, compares each channel's uploads
//! playlist against what the archive already holds, and sends every missing
//! video id to the archive's ingestion queue.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kumo::{Config, Kumo, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let kumo = Kumo::new(config)?;
//!     kumo.start().await?;
//!
//!     // Runs until SIGTERM or SIGINT
//!     run_with_shutdown(kumo).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive search client
pub mod archive;
/// Configuration types
pub mod config;
/// Channel and item concurrency limiting
pub mod dispatch;
/// Error types
pub mod error;
/// Hash-backed sets of video ids
pub mod id_set;
/// Incremental playlist retrieval
pub mod playlist;
/// Enqueue sink client
pub mod queue;
/// Published versus archived reconciliation
pub mod reconcile;
/// Channel roster retrieval and caching
pub mod roster;
/// Cron-driven preset firings
pub mod scheduler;
/// Service root
pub mod service;
/// Core types and reports
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, PermitPool};
pub use error::{Error, Result, SourceError};
pub use id_set::IdSet;
pub use playlist::{FetchState, PlaylistFetcher, PlaylistPage, PlaylistSource, YouTubeClient};
pub use service::Kumo;
pub use types::{Channel, ChannelReport, FiringReport, ItemOutcome, Reconciliation};

/// Run kumo until SIGTERM or SIGINT (Ctrl+C elsewhere), then shut it down gracefully.
///
/// # Errors
/// [`Error::Io`] if the signal handlers cannot be installed.
pub async fn run_with_shutdown(kumo: Kumo) -> Result<()> {
    wait_for_signal().await?;
    kumo.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C");
    Ok(())
}
