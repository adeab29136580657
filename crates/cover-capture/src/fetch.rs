//! Plain HTTP fetching of pages and images.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CaptureError;
use crate::Result;

/// Trait for HTTP fetching, enabling fakes in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page's markup.
    async fn fetch_html(&self, url: &str) -> Result<String>;

    /// Fetch binary content (an image) from a URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; cover-capture/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client }
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptureError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching page");
        Ok(self.get_ok(url).await?.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Fetching image");
        Ok(self.get_ok(url).await?.bytes().await?.to_vec())
    }
}
