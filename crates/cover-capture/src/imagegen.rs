//! Generated covers (OpenAI Images API)

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CaptureError;
use crate::Result;

/// News content beyond this many characters is left out of the prompt.
const MAX_CONTENT_CHARS: usize = 3_000;

/// Image generation capability
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate a cover for a news item.
    ///
    /// `Ok(None)` when the service answered without a usable image.
    async fn generate(&self, title: &str, content: &str) -> Result<Option<Vec<u8>>>;
}

/// OpenAI images configuration
#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    pub api_key: String,
    /// Model name (default: "dall-e-3")
    pub model: String,
    pub api_base: String,
    pub size: String,
    pub request_timeout: Duration,
}

impl ImageGenConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "dall-e-3".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            size: "1024x1024".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn generations_url(&self) -> String {
        format!("{}/images/generations", self.api_base.trim_end_matches('/'))
    }
}

/// Build the generation prompt for a news item.
pub fn build_cover_prompt(title: &str, content: &str) -> String {
    let content: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    format!(
        "<requirement>Create a 1:1 (1024x1024) social media cover image for a tech news item. \
It should read clearly as a thumbnail.</requirement>\n\
<news_info>\n{title}\n\n{content}\n</news_info>\n\
<style>Centered composition or a 2/3 split layout, keeping a 10-15% margin on every side. \
Pick one visual style: flat illustration, futuristic UI, or isometric 3D.</style>\n\
<rules>No extra text or watermarks. No realistic human faces. No brand logos.</rules>"
    )
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u32,
    size: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
}

/// OpenAI-backed generator
pub struct OpenAiImageGenerator {
    config: ImageGenConfig,
    http_client: reqwest::Client,
}

impl OpenAiImageGenerator {
    pub fn new(config: ImageGenConfig) -> Self {
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
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, title: &str, content: &str) -> Result<Option<Vec<u8>>> {
        if self.config.api_key.is_empty() {
            return Err(CaptureError::NotConfigured(
                "image generation requires an API key".to_string(),
            ));
        }

        info!(title, model = %self.config.model, "Generating cover image");
        let url = self.config.generations_url();
        let request = GenerationRequest {
            model: &self.config.model,
            prompt: build_cover_prompt(title, content),
            n: 1,
            size: &self.config.size,
            response_format: "b64_json",
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CaptureError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_generated(&body))
    }
}

/// First generated image in a response body, if any decodes.
fn decode_generated(body: &str) -> Option<Vec<u8>> {
    let response: GenerationResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Unreadable image generation response");
            return None;
        }
    };

    let encoded = response.data.into_iter().next()?.b64_json?;
    match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Generated image is not valid base64");
            None
        }
    }
}
