//! External API clients module
use crate::domain::DateKey;
use crate::errors::{ApiError, ApiResult};
use crate::utils::redact_api_key;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
pub mod stub;

/// Default APOD endpoint
pub const APOD_URL: &str = "https://api.nasa.gov/planetary/apod";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "apod-client/0.1";

/// Performs a single GET and hands back the body.
///
/// Implementations must stop and return [`ApiError::Cancelled`] once
/// `cancel` fires. No retries.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> ApiResult<String>;
}

/// HTTP client wrapper with common configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> ApiResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> ApiResult<String> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                url: redact_api_key(url),
            });
        }

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl RemoteFetcher for HttpClient {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> ApiResult<String> {
        debug!(url = %redact_api_key(url), "GET");

        // Dropping the in-flight request future aborts the connection.
        tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            body = self.get_text(url) => body,
        }
    }
}

/// Builds APOD request URLs for a given day
#[derive(Debug, Clone)]
pub struct ApodEndpoint {
    base_url: Url,
    api_key: String,
}

impl ApodEndpoint {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("invalid APOD URL '{}': {}", base_url, e)))?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Endpoint on api.nasa.gov with the given key
    pub fn nasa(api_key: impl Into<String>) -> ApiResult<Self> {
        Self::new(APOD_URL, api_key)
    }

    /// `<base>?api_key=<key>&date=<YYYY-MM-DD>`
    pub fn url_for(&self, date: DateKey) -> String {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            if !self.api_key.is_empty() {
                query.append_pair("api_key", &self.api_key);
            }
            query.append_pair("date", &date.to_string());
        }
        url.to_string()
    }
}
