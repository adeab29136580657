//! Cover-Capture: remote capabilities used to recover a news cover
//!
//! Every capability is an async trait with one HTTP-backed implementation
//! and one in-memory fake:
//!
//! - [`ScreenshotCapture`]: browser-rendered screenshot plus page markup
//! - [`PageFetcher`]: plain GET of markup or image bytes
//! - [`HtmlCoverParser`]: prioritized metadata search for a cover image
//! - [`VisualJudge`]: is this image an acceptable cover?
//! - [`ImageGenerator`]: synthesize a cover from title and content
//!
//! ## Layer 1 - Capabilities
//!
//! Focus: interpret remote responses; domain-negative answers are values,
//! transport and protocol failures are [`CaptureError`]s.

pub mod error;
pub mod fakes;
pub mod fetch;
pub mod html;
pub mod imagegen;
pub mod screenshot;
pub mod vision;

pub use error::CaptureError;
pub use fetch::{HttpFetcher, PageFetcher};
pub use html::{find_cover_image_url, HtmlCoverParser};
pub use imagegen::{build_cover_prompt, ImageGenConfig, ImageGenerator, OpenAiImageGenerator};
pub use screenshot::{
    BrowserRenderingClient, BrowserRenderingConfig, ScreenshotCapture, Snapshot,
};
pub use vision::{GeminiJudge, ImageSource, Verdict, VisionConfig, VisualJudge, MAX_REASON_CHARS};

/// Result type for capability calls
pub type Result<T> = std::result::Result<T, CaptureError>;
