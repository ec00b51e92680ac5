//! External JSON fetcher
//!
//! Performs a single bounded GET against a caller-supplied URL and returns
//! the parsed JSON body. No retries, no caching.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Timeout applied to every fetch unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Identifying `User-Agent` sent with every request
pub const USER_AGENT: &str = "MailService/1.0";

/// Largest upstream body read unless configured otherwise
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    /// URL did not parse or is not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No complete response within the timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-2xx status
    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Body is not JSON
    #[error("Response is not valid JSON: {0}")]
    Decode(String),

    /// Body exceeds the configured limit
    #[error("Response body exceeds {0} bytes")]
    TooLarge(usize),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Fetches JSON documents from external URLs
#[derive(Clone)]
pub struct ExternalFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_response_bytes: usize,
}

impl ExternalFetcher {
    /// Create a fetcher with the default 5 second timeout
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Cap the size of upstream bodies
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Parse and check a fetch target without touching the network
    pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
        let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                scheme
            ))),
        }
    }

    /// GET `url` and parse the body as JSON
    pub async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let url = Self::parse_url(url)?;
        debug!(%url, "Fetching external data");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "External fetch returned error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let limit = self.max_response_bytes;
        if response.content_length().map_or(false, |len| len > limit as u64) {
            warn!("Upstream {} announced a body larger than {} bytes", url, limit);
            return Err(FetchError::TooLarge(limit));
        }

        // Chunked bodies carry no length, so the cap is enforced while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > limit {
                warn!("Upstream {} body exceeded {} bytes", url, limit);
                return Err(FetchError::TooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}
