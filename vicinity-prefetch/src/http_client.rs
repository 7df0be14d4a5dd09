//! `reqwest`-backed [`TileClient`] talking to a running batch service.
//!
//! # Example
//!
//! ```no_run
//! use vicinity_prefetch::{HttpTileClient, TileClient};
//! use vicinity_core::{BatchRequest, Factor, ScoringConfig, TileCoord};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpTileClient::new("http://localhost:8080")?;
//! let request = BatchRequest::new(
//!     vec![TileCoord::new(14, 8800, 5373)?],
//!     ScoringConfig::new(vec![Factor::new("park", 80.0, 1_000.0)]),
//! );
//! let response = client.fetch_batch(&request).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use thiserror::Error;
use vicinity_core::{BatchRequest, BatchResponse, Encoding, decode_response};

use crate::{FetchError, TileClient};

/// Default user agent for batch requests.
pub const DEFAULT_USER_AGENT: &str = "vicinity-prefetch/0.1";

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Path of the batch endpoint below the base URL.
const BATCH_PATH: &str = "/api/tiles/batch";

/// Failure building an [`HttpTileClient`].
#[derive(Debug, Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Configuration for [`HttpTileClient`].
#[derive(Debug, Clone)]
pub struct HttpTileClientConfig {
    /// Base URL of the service (e.g. `"http://localhost:8080"`).
    pub base_url: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Ask for the compact `bincode` response encoding.
    pub binary: bool,
}

impl Default for HttpTileClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:8080"),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: String::from(DEFAULT_USER_AGENT),
            binary: true,
        }
    }
}

impl HttpTileClientConfig {
    /// Configuration for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Choose between the `bincode` and JSON response encodings.
    #[must_use]
    pub const fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
}

/// Batch client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTileClient {
    client: Client,
    endpoint: String,
    encoding: Encoding,
}

impl HttpTileClient {
    /// Client for the service at `base_url` with default settings.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientBuildError> {
        Self::with_config(&HttpTileClientConfig::new(base_url))
    }

    /// Client with explicit configuration.
    ///
    /// # Errors
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn with_config(config: &HttpTileClientConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()?;
        let encoding = if config.binary {
            Encoding::Binary
        } else {
            Encoding::Json
        };
        Ok(Self {
            client,
            endpoint: format!("{}{BATCH_PATH}", config.base_url.trim_end_matches('/')),
            encoding,
        })
    }

    /// Full URL of the batch endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error) -> FetchError {
        if let Some(status) = error.status() {
            return FetchError::Http {
                url: self.endpoint.clone(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        if error.is_decode() {
            return FetchError::Decode {
                message: error.to_string(),
            };
        }
        FetchError::Network {
            url: self.endpoint.clone(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl TileClient for HttpTileClient {
    async fn fetch_batch(&self, request: &BatchRequest) -> Result<BatchResponse, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, self.encoding.content_type())
            .json(request)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|err| err.to_string());
            return Err(FetchError::Http {
                url: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let encoding = Encoding::from_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
        );
        let body = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err))?;
        decode_response(&body, encoding).map_err(|err| FetchError::Decode {
            message: err.to_string(),
        })
    }
}
