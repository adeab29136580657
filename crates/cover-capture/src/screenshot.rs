//! Browser-rendered screenshots (Cloudflare Browser Rendering `snapshot`)
//!
//! One call returns both a base64 PNG of the first viewport and the rendered
//! markup, so later stages can look for cover metadata without a second fetch.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CaptureError;
use crate::Result;

/// Navigation timeout handed to the renderer, in milliseconds
pub const GOTO_TIMEOUT_MS: u64 = 20_000;

/// Style overrides applied to GitHub pages before capture: hide the header,
/// the repository chrome and the file table so the README leads.
const GITHUB_STYLE: &str = r#".header-wrapper,
#repository-container-header,
react-partial[partial-name="repos-overview"] div[data-target="react-partial.reactRoot"] div.Box-sc-g0xbh4-0.iNSVHo,
table[aria-labelledby="folders-and-files"] { display: none; }

.repository-content .container-xl {
  padding-left: 0 !important;
  padding-right: 0 !important;
}

.Box-sc-g0xbh4-0.iVEunk {
  margin-top: 0;
}
.vIPPs {
  gap: 0;
}"#;

/// Result of one capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Base64-encoded PNG
    pub screenshot: String,
    /// Rendered page markup
    pub content: String,
}

impl Snapshot {
    /// Build a snapshot from raw PNG bytes (fakes and tooling).
    pub fn from_png(png: &[u8], content: impl Into<String>) -> Self {
        Self {
            screenshot: base64::engine::general_purpose::STANDARD.encode(png),
            content: content.into(),
        }
    }

    /// Raw bytes of the screenshot.
    pub fn decode_screenshot(&self) -> Result<Vec<u8>> {
        Ok(base64::engine::general_purpose::STANDARD.decode(self.screenshot.trim())?)
    }
}

/// Screenshot capability
#[async_trait]
pub trait ScreenshotCapture: Send + Sync {
    /// Render `url` and capture it, waiting `settle` after load when given.
    async fn capture(&self, url: &str, settle: Option<Duration>) -> Result<Snapshot>;
}

/// Browser Rendering configuration
#[derive(Debug, Clone)]
pub struct BrowserRenderingConfig {
    pub account_id: String,
    pub api_token: String,
    /// API base (default: `https://api.cloudflare.com/client/v4`)
    pub api_base: String,
    /// Overall HTTP timeout for one capture
    pub request_timeout: Duration,
}

impl BrowserRenderingConfig {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_token: api_token.into(),
            api_base: "https://api.cloudflare.com/client/v4".to_string(),
            request_timeout: Duration::from_secs(90),
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!(
            "{}/accounts/{}/browser-rendering/snapshot",
            self.api_base.trim_end_matches('/'),
            self.account_id
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SnapshotRequest {
    url: String,
    screenshot_options: ScreenshotOptions,
    viewport: Viewport,
    add_style_tag: Vec<StyleTag>,
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotOptions {
    full_page: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Viewport {
    width: u32,
    height: u32,
    device_scale_factor: u32,
    is_mobile: bool,
}

#[derive(Debug, Serialize)]
struct StyleTag {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    success: bool,
    #[serde(default)]
    result: Option<Snapshot>,
    #[serde(default)]
    errors: serde_json::Value,
}

impl SnapshotRequest {
    pub(crate) fn new(url: &str, settle: Option<Duration>) -> Self {
        Self {
            url: url.to_string(),
            screenshot_options: ScreenshotOptions { full_page: false },
            viewport: Viewport {
                width: 600,
                height: 600,
                device_scale_factor: 2,
                is_mobile: true,
            },
            add_style_tag: style_overrides(url),
            goto_options: GotoOptions {
                wait_until: "networkidle0",
                timeout: GOTO_TIMEOUT_MS,
            },
            wait_for_timeout: settle.map(|d| d.as_millis() as u64),
        }
    }
}

fn style_overrides(url: &str) -> Vec<StyleTag> {
    if url.starts_with("https://github.com") {
        vec![StyleTag {
            content: GITHUB_STYLE.to_string(),
        }]
    } else {
        Vec::new()
    }
}

/// Browser Rendering client
pub struct BrowserRenderingClient {
    config: BrowserRenderingConfig,
    http_client: reqwest::Client,
}

impl BrowserRenderingClient {
    pub fn new(config: BrowserRenderingConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cover-capture/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl ScreenshotCapture for BrowserRenderingClient {
    async fn capture(&self, url: &str, settle: Option<Duration>) -> Result<Snapshot> {
        info!(url, settle_ms = ?settle.map(|d| d.as_millis()), "Capturing screenshot");

        let response = self
            .http_client
            .post(self.config.snapshot_url())
            .bearer_auth(&self.config.api_token)
            .json(&SnapshotRequest::new(url, settle))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let envelope: SnapshotEnvelope = serde_json::from_str(&body).map_err(|e| {
            CaptureError::Malformed(format!("snapshot response (status {status}): {e}"))
        })?;

        if !envelope.success {
            return Err(CaptureError::Api(format!(
                "Failed to capture screenshot: {}",
                envelope.errors
            )));
        }

        let snapshot = envelope
            .result
            .ok_or_else(|| CaptureError::Malformed("snapshot result missing".to_string()))?;

        debug!(
            url,
            screenshot_len = snapshot.screenshot.len(),
            content_len = snapshot.content.len(),
            "Screenshot captured"
        );
        Ok(snapshot)
    }
}
