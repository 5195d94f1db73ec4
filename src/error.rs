//! Error types for kumo
//!
//! Failures are contained at the smallest unit that can fail independently
//! (one item, one channel, one preset firing). Every variant carries enough
//! context for a structured log line, and [`Error::is_cancelled`] lets each
//! handler tell a shutdown apart from a genuine failure.

use thiserror::Error;

/// Result type alias for kumo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kumo
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "app.max_concurrency")
        key: Option<String>,
    },

    /// Operation aborted because the root cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Channel id does not carry the `UC` prefix
    #[error("invalid channel ID: {0}")]
    InvalidChannelId(String),

    /// Fetching the channel roster failed
    #[error("failed to fetch channel roster: {0}")]
    Roster(#[source] SourceError),

    /// Fetching a page of a playlist failed
    #[error("failed to fetch playlist {playlist_id}: {source}")]
    Playlist {
        /// The playlist being walked
        playlist_id: String,
        /// The underlying failure
        #[source]
        source: SourceError,
    },

    /// Querying the archive for a channel failed
    #[error("failed to query archive for channel {channel_id}: {source}")]
    Archive {
        /// The channel whose archived videos were requested
        channel_id: String,
        /// The underlying failure
        #[source]
        source: SourceError,
    },

    /// The enqueue sink rejected or never received a video id
    #[error("failed to enqueue video {video_id}: {source}")]
    Dispatch {
        /// The video id that was not enqueued
        video_id: String,
        /// The underlying failure
        #[source]
        source: SourceError,
    },

    /// Cron scheduler could not be built, started or stopped
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Signal handlers could not be installed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to one of the external HTTP sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The source answered with an unexpected HTTP status
    #[error("unexpected HTTP status {status}{}", message_suffix(.message))]
    Status {
        /// HTTP status code returned by the source
        status: u16,
        /// Error message extracted from the response body, when available
        message: Option<String>,
    },

    /// The response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Decode(e.to_string())
    }
}

impl Error {
    /// Returns true when the error only reports that shutdown was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Machine-readable error code, used as a structured log field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Cancelled => "cancelled",
            Error::InvalidChannelId(_) => "invalid_channel_id",
            Error::Roster(source)
            | Error::Playlist { source, .. }
            | Error::Archive { source, .. } => source.error_code(),
            Error::Dispatch { .. } => "dispatch_error",
            Error::Scheduler(_) => "scheduler_error",
            Error::Io(_) => "io_error",
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

impl SourceError {
    /// Machine-readable error code, used as a structured log field
    pub fn error_code(&self) -> &'static str {
        match self {
            SourceError::Transport(_) | SourceError::Status { .. } => "transport_error",
            SourceError::Decode(_) => "decode_error",
        }
    }
}
