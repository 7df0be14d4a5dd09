//! The batch endpoint as seen by the orchestrator.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use vicinity_core::{BatchRequest, BatchResponse};

/// Failure of a single batch call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The caller's cancellation token fired first.
    #[error("request cancelled")]
    Cancelled,
    /// The request outlived its deadline.
    #[error("request timed out after {} ms", after.as_millis())]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// Endpoint that was called.
        url: String,
        /// Status code returned.
        status: u16,
        /// Response body or reason.
        message: String,
    },
    /// The server could not be reached.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Endpoint that was called.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// The response body did not decode.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error message.
        message: String,
    },
}

/// Something that can answer batch requests.
///
/// Implementations should not impose their own deadline;
/// [`fetch_with_deadline`] applies the orchestrator's timeout and
/// cancellation to every call.
#[async_trait]
pub trait TileClient: Send + Sync {
    /// Send one batch request.
    async fn fetch_batch(&self, request: &BatchRequest) -> Result<BatchResponse, FetchError>;
}

#[async_trait]
impl<T: TileClient + ?Sized> TileClient for Arc<T> {
    async fn fetch_batch(&self, request: &BatchRequest) -> Result<BatchResponse, FetchError> {
        (**self).fetch_batch(request).await
    }
}

/// Run a batch call until it completes, `timeout` elapses or `cancel` fires,
/// whichever comes first.
///
/// # Errors
/// Returns [`FetchError::Cancelled`] or [`FetchError::Timeout`] when the call
/// is cut short, and the client's own error otherwise.
pub async fn fetch_with_deadline<C>(
    client: &C,
    request: &BatchRequest,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<BatchResponse, FetchError>
where
    C: TileClient + ?Sized,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        outcome = tokio::time::timeout(timeout, client.fetch_batch(request)) => {
            outcome.unwrap_or(Err(FetchError::Timeout { after: timeout }))
        }
    }
}
