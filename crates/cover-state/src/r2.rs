//! S3-compatible object store (Cloudflare R2)
//!
//! Covers are written with a single signed `PutObject` request to
//! `https://<account>.r2.cloudflarestorage.com/<bucket>/<key>`.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::sigv4::Signer;
use crate::storage_traits::{ObjectStore, StorageResult};

/// Object store configuration
#[derive(Debug, Clone)]
pub struct R2Config {
    /// Cloudflare account id (also names the endpoint host)
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Bucket covers are written to
    pub bucket: String,
    /// Signing region; R2 accepts `auto`
    pub region: String,
    /// Override for the endpoint, e.g. a local S3 emulator
    pub endpoint: Option<String>,
}

impl R2Config {
    /// Create a configuration for the default bucket.
    pub fn new(
        account_id: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: "koala-oss-app".to_string(),
            region: "auto".to_string(),
            endpoint: None,
        }
    }

    /// Set the bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set a custom endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Base endpoint URL without trailing slash
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.r2.cloudflarestorage.com", self.account_id),
        }
    }

    /// Full object URL for `key`
    pub fn object_url(&self, key: &str) -> StorageResult<Url> {
        let raw = format!("{}/{}/{}", self.endpoint_url(), self.bucket, key);
        Url::parse(&raw).map_err(|e| StorageError::InvalidUrl(format!("{raw}: {e}")))
    }
}

/// R2-backed `ObjectStore`
pub struct R2ObjectStore {
    config: R2Config,
    signer: Signer,
    http_client: reqwest::Client,
}

impl R2ObjectStore {
    /// Create a new store
    pub fn new(config: R2Config) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cover-state/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        let signer = Signer::new(
            &config.access_key_id,
            &config.secret_access_key,
            &config.region,
        );

        Self {
            config,
            signer,
            http_client,
        }
    }

    pub fn config(&self) -> &R2Config {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    #[instrument(skip(self, bytes), fields(bucket = %self.config.bucket, size = bytes.len()))]
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        let url = self.config.object_url(key)?;
        let signed = self.signer.sign(
            "PUT",
            url.as_str(),
            [("content-type", content_type)].into_iter(),
            bytes,
            SystemTime::now(),
        )?;

        let mut request = self
            .http_client
            .put(url.clone())
            .header("content-type", content_type);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: format!("status {}: {}", status.as_u16(), body),
            });
        }

        debug!(key, "Object stored");
        Ok(())
    }
}
