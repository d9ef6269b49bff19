use crate::traits::FeedFetcher;
use crate::types::{FetchConfig, FetchedPayload, RelayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Plain HTTP GET against feed locations. One attempt per run; retrying is
/// left to whatever schedules the next invocation.
pub struct HttpFeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

/// Shared by the feed fetcher and the webhook sinks.
pub fn build_client(config: &FetchConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()?;
    Ok(client)
}

/// Append a `_=<unix millis>` parameter so intermediate caches never serve
/// a stale document.
pub fn cache_busted(location: &str, millis: i64) -> Result<Url> {
    let mut url = Url::parse(location)?;
    url.query_pairs_mut().append_pair("_", &millis.to_string());
    Ok(url)
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, location: &str) -> Result<FetchedPayload> {
        let start_time = Instant::now();
        let url = cache_busted(location, Utc::now().timestamp_millis())?;

        debug!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(RelayError::Feed(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await?;
        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            location,
            body.len(),
            start_time.elapsed().as_millis()
        );

        Ok(FetchedPayload {
            content_type,
            status: status.as_u16(),
            body,
        })
    }
}
