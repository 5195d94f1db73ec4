//! Shared helpers for cancellable HTTP calls

use crate::error::{Error, Result, SourceError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = concat!("kumo/", env!("CARGO_PKG_VERSION"));

/// Run `fut` until it completes or `cancel` fires, whichever happens first
///
/// Cancellation is reported as [`Error::Cancelled`] so callers never mistake
/// a shutdown for a failed request.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Build the HTTP client shared by every external source
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Config {
            message: format!("failed to create HTTP client: {e}"),
            key: None,
        })
}

/// Turn a non-2xx response into [`SourceError::Status`]
pub(crate) fn ensure_success(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status {
            status: status.as_u16(),
            message: None,
        })
    }
}
