//! Scripted fakes for the capability traits (testing only)
//!
//! Each fake replays a queue of scripted answers and records the calls it
//! received, so pipeline tests can assert both on routing and on exactly
//! what was asked of each capability.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CaptureError;
use crate::fetch::PageFetcher;
use crate::imagegen::ImageGenerator;
use crate::screenshot::{ScreenshotCapture, Snapshot};
use crate::vision::{ImageSource, Verdict, VisualJudge};
use crate::Result;

// ---------------------------------------------------------------------------
// FakeScreenshot
// ---------------------------------------------------------------------------

/// Replays scripted snapshots in order; errors once the script runs out.
#[derive(Debug, Default)]
pub struct FakeScreenshot {
    script: Mutex<VecDeque<Result<Snapshot>>>,
    calls: Mutex<Vec<(String, Option<Duration>)>>,
}

impl FakeScreenshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful capture.
    pub fn then_ok(self, png: &[u8], html: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(Snapshot::from_png(png, html)));
        self
    }

    /// Queue a raw snapshot (e.g. one with a corrupt screenshot field).
    pub fn then_snapshot(self, snapshot: Snapshot) -> Self {
        self.script.lock().unwrap().push_back(Ok(snapshot));
        self
    }

    /// Queue a failed capture.
    pub fn then_fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(CaptureError::Api(message.to_string())));
        self
    }

    /// `(url, settle)` of every capture, in order.
    pub fn calls(&self) -> Vec<(String, Option<Duration>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreenshotCapture for FakeScreenshot {
    async fn capture(&self, url: &str, settle: Option<Duration>) -> Result<Snapshot> {
        self.calls.lock().unwrap().push((url.to_string(), settle));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CaptureError::Api("no scripted snapshot".to_string())))
    }
}

// ---------------------------------------------------------------------------
// FakeFetcher
// ---------------------------------------------------------------------------

/// Serves fixed pages and images by URL; anything else is a 404.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    images: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Every URL requested, pages and images alike.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn not_found(url: &str) -> CaptureError {
        CaptureError::Status {
            url: url.to_string(),
            status: 404,
            body: "not found".to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.images.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}

// ---------------------------------------------------------------------------
// FakeJudge
// ---------------------------------------------------------------------------

/// Replays scripted verdicts in order.
///
/// Once the script runs out every image is judged insufficient.
#[derive(Debug, Default)]
pub struct FakeJudge {
    script: Mutex<VecDeque<Verdict>>,
    seen: Mutex<Vec<ImageSource>>,
}

impl FakeJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, verdict: Verdict) -> Self {
        self.script.lock().unwrap().push_back(verdict);
        self
    }

    pub fn then_pass(self) -> Self {
        self.then(Verdict::sufficient("looks good"))
    }

    pub fn then_reject(self, reason: &str) -> Self {
        self.then(Verdict::insufficient(reason))
    }

    /// Every image judged, in order.
    pub fn seen(&self) -> Vec<ImageSource> {
        self.seen.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl VisualJudge for FakeJudge {
    async fn judge(&self, image: ImageSource) -> Verdict {
        self.seen.lock().unwrap().push(image);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Verdict::insufficient("no scripted verdict"))
    }
}

// ---------------------------------------------------------------------------
// FakeImageGenerator
// ---------------------------------------------------------------------------

/// Replays scripted generation results; `Ok(None)` once the script runs out.
#[derive(Debug, Default)]
pub struct FakeImageGenerator {
    script: Mutex<VecDeque<Result<Option<Vec<u8>>>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_image(self, bytes: &[u8]) -> Self {
        self.script.lock().unwrap().push_back(Ok(Some(bytes.to_vec())));
        self
    }

    pub fn then_nothing(self) -> Self {
        self.script.lock().unwrap().push_back(Ok(None));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(CaptureError::Api(message.to_string())));
        self
    }

    /// `(title, content)` of every request.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, title: &str, content: &str) -> Result<Option<Vec<u8>>> {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string()));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}
