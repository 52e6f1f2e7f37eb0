//! HTTP client for the VATSIM status and data feeds.
//!
//! `VatsimClient` resolves the list of equivalent data mirrors (either a
//! fixed list or the `data.v3` entries of the status document) and fetches
//! one snapshot document from a randomly chosen mirror.

use std::future::Future;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Status document listing the current data feed mirrors.
pub const DEFAULT_STATUS_URL: &str = "https://status.vatsim.net/status.json";

/// HTTP request timeout in seconds.
/// The data feed is a few megabytes; 30s is generous for a slow mirror.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source of raw snapshot documents.
///
/// `SnapshotStore` only ever asks for one document per refresh, so this is
/// the whole contract. Tests plug in scripted implementations.
pub trait Upstream: Send + Sync + 'static {
    /// Fetch one raw document from one of the upstream mirrors.
    fn fetch_one(&self) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

#[derive(Debug, Default, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    data: StatusData,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    v3: Vec<String>,
}

/// Client for the VATSIM data feed.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct VatsimClient {
    client: Client,
    status_url: String,
    data_urls: Vec<String>,
}

impl VatsimClient {
    /// Create a client with the default timeout that discovers mirrors from
    /// the public status document.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.into()))?;

        Ok(Self {
            client,
            status_url: DEFAULT_STATUS_URL.to_string(),
            data_urls: Vec::new(),
        })
    }

    /// Use a different status document for mirror discovery.
    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = url.into();
        self
    }

    /// Pin the mirror list. Discovery is skipped when this is non-empty.
    pub fn with_data_urls(mut self, urls: Vec<String>) -> Self {
        self.data_urls = urls;
        self
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// Resolve the candidate mirrors for the data feed.
    pub async fn list_sources(&self) -> Result<Vec<String>, ApiError> {
        if !self.data_urls.is_empty() {
            return Ok(self.data_urls.clone());
        }

        let status: StatusDocument = self.get_json(&self.status_url).await?;
        let sources: Vec<String> = status
            .data
            .v3
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .collect();

        if sources.is_empty() {
            return Err(ApiError::NoSources);
        }
        debug!(count = sources.len(), "Discovered data mirrors");
        Ok(sources)
    }

    async fn fetch_document(&self) -> Result<Value, ApiError> {
        let sources = self.list_sources().await?;
        let url = {
            let mut rng = rand::thread_rng();
            sources.choose(&mut rng).cloned()
        }
        .ok_or(ApiError::NoSources)?;

        debug!(url = %url, "Fetching snapshot from mirror");
        self.get_json(&url).await
    }

    /// Single GET declaring JSON acceptance. Only an exact 200 counts as
    /// success; there is no retry.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(url, status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(url, e))?;

        serde_json::from_slice(&bytes).map_err(|e| ApiError::parse(url, e))
    }
}

impl Upstream for VatsimClient {
    fn fetch_one(&self) -> impl Future<Output = Result<Value, ApiError>> + Send {
        self.fetch_document()
    }
}
