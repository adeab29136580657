//! Visual sufficiency check.
//!
//! A multimodal model looks at a cover and answers whether it is usable or
//! an empty, half-loaded or error page. The judge never fails: any fault is
//! reported as an insufficient verdict carrying the fault text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::fetch::PageFetcher;
use crate::Result;

/// Upper bound on the length of a verdict reason, in characters
pub const MAX_REASON_CHARS: usize = 32;

const CHECK_PROMPT: &str = "<requirement>This is an automatically captured cover image for a tech \
weekly news item. Check whether the image is blank, not fully loaded, or shows a loading error \
message; automated screenshots can miss the moment the page finishes loading.</requirement>\n\
<response_format>{\"sufficient\": boolean, \"reason\": string}</response_format>";

/// What the judge is asked to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// In-memory candidate
    Bytes(Vec<u8>),
    /// Publicly reachable image
    Url(String),
}

/// Structured answer of the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub sufficient: bool,
    /// Short human-readable reason, at most [`MAX_REASON_CHARS`] characters
    pub reason: String,
}

impl Verdict {
    pub fn new(sufficient: bool, reason: impl AsRef<str>) -> Self {
        Self {
            sufficient,
            reason: reason.as_ref().trim().chars().take(MAX_REASON_CHARS).collect(),
        }
    }

    pub fn sufficient(reason: impl AsRef<str>) -> Self {
        Self::new(true, reason)
    }

    pub fn insufficient(reason: impl AsRef<str>) -> Self {
        Self::new(false, reason)
    }
}

/// Visual sufficiency capability
#[async_trait]
pub trait VisualJudge: Send + Sync {
    /// Judge an image. Faults come back as `sufficient: false`.
    async fn judge(&self, image: ImageSource) -> Verdict;
}

/// Gemini configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    /// Model name (default: "gemini-2.0-flash-001")
    pub model: String,
    pub api_base: String,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.0-flash-001".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 1,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini-backed judge
pub struct GeminiJudge {
    config: VisionConfig,
    fetcher: Arc<dyn PageFetcher>,
    http_client: reqwest::Client,
}

impl GeminiJudge {
    /// `fetcher` downloads URL sources so they can be sent inline.
    pub fn new(config: VisionConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cover-capture/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            fetcher,
            http_client,
        }
    }

    async fn try_judge(&self, image: ImageSource) -> Result<Verdict> {
        let bytes = match image {
            ImageSource::Bytes(bytes) => bytes,
            ImageSource::Url(url) => self.fetcher.fetch_bytes(&url).await?,
        };
        let body = request_body(&bytes);

        let mut attempt = 0;
        loop {
            match self.request(&body).await {
                Err(e) if attempt < self.config.max_retries && is_transient(&e) => {
                    attempt += 1;
                    debug!(attempt, error = %e, "Retrying visual check");
                }
                other => return other,
            }
        }
    }

    async fn request(&self, body: &serde_json::Value) -> Result<Verdict> {
        let url = self.config.generate_url();
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CaptureError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }
        parse_verdict_response(&text)
    }
}

#[async_trait]
impl VisualJudge for GeminiJudge {
    async fn judge(&self, image: ImageSource) -> Verdict {
        match self.try_judge(image).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Visual check faulted");
                Verdict::insufficient(e.to_string())
            }
        }
    }
}

fn is_transient(err: &CaptureError) -> bool {
    match err {
        CaptureError::Http(_) => true,
        CaptureError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn request_body(image: &[u8]) -> serde_json::Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": CHECK_PROMPT },
                {
                    "inline_data": {
                        "mime_type": sniff_mime(image),
                        "data": base64::engine::general_purpose::STANDARD.encode(image),
                    }
                }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "sufficient": { "type": "BOOLEAN" },
                    "reason": { "type": "STRING", "description": "max length: 32 characters" }
                },
                "required": ["sufficient", "reason"]
            }
        }
    })
}

/// Guess an image MIME type from its magic bytes, defaulting to PNG.
pub(crate) fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/png",
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    sufficient: bool,
    reason: String,
}

/// Extract the structured verdict from a `generateContent` response body.
pub(crate) fn parse_verdict_response(body: &str) -> Result<Verdict> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| CaptureError::Malformed("no text part in response".to_string()))?;

    let payload: VerdictPayload = serde_json::from_str(&text)?;
    Ok(Verdict::new(payload.sufficient, payload.reason))
}
