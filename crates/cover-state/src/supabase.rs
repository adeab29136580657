//! Supabase (PostgREST) news repository
//!
//! Talks to `<SUPABASE_URL>/rest/v1/<table>` with the service key, so row
//! level security does not hide pending rows.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::schema::{CheckResultUpdate, NewsId, NewsItem};
use crate::storage_traits::{NewsRepository, StorageResult};

/// Configuration for the Supabase REST endpoint
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service role key
    pub service_key: String,
    /// Table holding news rows (default: "news")
    pub table: String,
}

impl SupabaseConfig {
    /// Create a configuration for the default `news` table
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            table: "news".to_string(),
        }
    }

    /// Set custom table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// REST endpoint of the configured table
    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

/// PostgREST-backed `NewsRepository`
pub struct SupabaseNewsRepository {
    config: SupabaseConfig,
    http_client: reqwest::Client,
}

impl SupabaseNewsRepository {
    /// Create a new repository client
    pub fn new(config: SupabaseConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cover-state/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }
}

async fn ensure_success(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl NewsRepository for SupabaseNewsRepository {
    #[instrument(skip(self), fields(table = %self.config.table))]
    async fn list_unchecked(&self) -> StorageResult<Vec<NewsItem>> {
        let request = self.http_client.get(self.config.table_url()).query(&[
            ("select", "*"),
            ("image_checked", "is.null"),
            ("order", "created_at.desc"),
        ]);

        let response = ensure_success(self.authorized(request).send().await?).await?;
        let items: Vec<NewsItem> = response.json().await?;

        info!(count = items.len(), "Fetched unchecked news");
        Ok(items)
    }

    #[instrument(skip(self, update), fields(table = %self.config.table))]
    async fn mark_check_result(
        &self,
        id: NewsId,
        update: CheckResultUpdate,
    ) -> StorageResult<()> {
        let request = self
            .http_client
            .patch(self.config.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&update);

        ensure_success(self.authorized(request).send().await?).await?;

        debug!(
            news_id = id,
            image_checked = update.image_checked,
            image = ?update.image,
            "Check result written"
        );
        Ok(())
    }
}
