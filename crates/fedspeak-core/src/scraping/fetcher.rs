//! HTTP fetching for the scrapers.
//!
//! [`PageFetcher`] is the seam between the scrapers and the network: the
//! scrapers only ever ask for the HTML at a URL, so tests drive them with
//! canned pages and production uses [`HttpFetcher`].

use crate::config::FetchConfig;
use crate::error::ScrapeError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::debug;

/// Source of HTML pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the HTML body at `url`.
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Validates that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<url::Url, ScrapeError> {
    let parsed =
        url::Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{}: {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ScrapeError::InvalidUrl(format!(
            "Unsupported scheme: {} (only http/https allowed)",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// Fetches pages over HTTP with a pooled `reqwest` client.
///
/// The client is built once per fetcher and reused for every request, so
/// connections to the same host are kept alive across a crawl. Configured
/// with the user agent and timeout from [`FetchConfig`].
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::RequestFailed`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &FetchConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.max_concurrent_requests.max(1))
            .build()
            .map_err(|e| ScrapeError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::RequestFailed(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::RequestFailed(format!(
                "{} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        // Skip images, PDFs and other non-HTML attachments
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.is_empty()
            && !content_type.contains("text/html")
            && !content_type.contains("text/plain")
            && !content_type.contains("application/xhtml")
        {
            return Err(ScrapeError::RequestFailed(format!(
                "Skipping non-HTML content at {}: {}",
                url, content_type
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ScrapeError::RequestFailed(format!("Failed to read body of {}: {}", url, e))
        })?;

        if content_inspector::inspect(&bytes).is_binary() {
            return Err(ScrapeError::RequestFailed(format!(
                "Skipping binary content at {}",
                url
            )));
        }

        debug!(url, bytes = bytes.len(), "Fetched page");
        // Archive pages from the 1990s are not always valid UTF-8
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Fetches `urls` with at most `max_in_flight` concurrent requests.
///
/// Results come back in the order of `urls`, regardless of completion
/// order, so scraper output is deterministic. `on_done` is called after each
/// page with the number of pages finished so far.
pub async fn fetch_all<F>(
    fetcher: &dyn PageFetcher,
    urls: Vec<String>,
    max_in_flight: usize,
    mut on_done: F,
) -> Vec<(String, Result<String, ScrapeError>)>
where
    F: FnMut(usize),
{
    let mut pages = stream::iter(urls.into_iter().map(|url| async move {
        let result = fetcher.fetch(&url).await;
        (url, result)
    }))
    .buffered(max_in_flight.max(1));

    let mut results = Vec::new();
    while let Some(page) = pages.next().await {
        results.push(page);
        on_done(results.len());
    }
    results
}
